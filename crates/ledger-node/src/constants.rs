pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub const STATUS_OK: &str = "ok";
pub const STATUS_MINED: &str = "mined";
