/// Application name
pub const APP_NAME: &str = "Yatube";

/// Posts (or groups) shown on one feed page
pub const POSTS_PER_PAGE: usize = 10;

/// Home page cache lifetime in seconds
pub const INDEX_CACHE_TTL_SECS: u64 = 20;

/// Sub-directory of the media root that holds post and comment images
pub const POST_IMAGE_SUBDIR: &str = "posts";

/// Maximum uploaded image size in bytes (5 MiB)
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Maximum length of a group title
pub const GROUP_TITLE_MAX_LEN: usize = 200;

/// Maximum length of a username
pub const USERNAME_MAX_LEN: usize = 150;

/// Minimum password length accepted at signup
pub const PASSWORD_MIN_LEN: usize = 8;

/// Characters of post text used for its short display string
pub const POST_PREVIEW_LEN: usize = 15;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "sessionid";

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 8000;
