pub const MAX_NAME_LENGTH: usize = 255;

pub const MAX_PRICE_DIGITS: u32 = 5;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

/// Lookups plus inserts tried before giving up on a contended `(owner, name)`.
pub const GET_OR_CREATE_ATTEMPTS: usize = 3;

/// Runs of a whole write transaction before a deadlock is reported.
pub const TRANSACTION_ATTEMPTS: usize = 3;

pub const MAX_JSON_BODY: u64 = 64 * 1024;

pub const IMAGE_FIELD: &str = "image";
pub const RECIPE_UPLOAD_DIR: &str = "uploads/recipe";

pub const SESSION_COOKIE: &str = "session";
pub const TOKEN_SCHEMES: &[&str] = &["Bearer", "Token"];

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_MEDIA_ROOT: &str = "./media";
pub const DEFAULT_MEDIA_URL: &str = "/static/media";
pub const DEFAULT_MAX_UPLOAD_BYTES: &str = "10485760";
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: &str = "5";
pub const DEFAULT_SESSION_TTL_HOURS: &str = "24";
