pub const NAME: &str = "anthropic";

pub const DEFAULT_PATH: &str = "/v1/messages";

// https://docs.anthropic.com/en/api/versioning
pub const DEFAULT_VERSION: &str = "2023-06-01";

pub const VERSION_HEADER: &str = "anthropic-version";
