//! Shared AWS plumbing: SDK configuration and error flattening.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};

/// Loads credentials and settings from the default provider chain, pinned to `region`.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// Machine-readable code and human-readable message of an SDK error.
///
/// Transport failures carry no service metadata; they get the code `Unknown`
/// and the full error chain as message.
pub fn error_parts<E>(err: &E) -> (String, String)
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let code = err.code().unwrap_or("Unknown").to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(err).to_string());
    (code, message)
}
