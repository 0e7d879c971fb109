/// Placeholder stored when a page does not carry a field at all.
/// Distinct from an empty string, which means the field was present but blank.
pub const UNKNOWN: &str = "N/A";

pub const DEFAULT_LISTING_URL: &str = "https://www.virgilio.it/italia/siena/eventi/concerti";
pub const DEFAULT_STORE_PATH: &str = "Eventi_Virgilio.it.json";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_CONCURRENCY: usize = 4;

pub const DEFAULT_DESCRIPTION_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_DESCRIPTION_MODEL: &str = "llama-3.2-11b-vision-preview";
pub const DEFAULT_DESCRIPTION_MAX_TOKENS: u32 = 150;
pub const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Italian short month names as printed on event pages.
pub const ITALIAN_MONTHS: [(&str, u32); 12] = [
    ("Gen", 1),
    ("Feb", 2),
    ("Mar", 3),
    ("Apr", 4),
    ("Mag", 5),
    ("Giu", 6),
    ("Lug", 7),
    ("Ago", 8),
    ("Set", 9),
    ("Ott", 10),
    ("Nov", 11),
    ("Dic", 12),
];

// Default selector candidates, most specific first.

pub const LISTING_LINK_SELECTORS: &[&str] = &[
    "h2 > a[itemprop=\"url\"]",
    "article div.eventContent > h2 > a",
];

pub const TITLE_SELECTORS: &[&str] = &["h2[itemprop=\"name\"]", "h2"];

pub const DESCRIPTION_SELECTORS: &[&str] = &[
    "#long-desc > div",
    "#long-desc > div > p",
    "#long-desc",
    "div[itemprop=\"description\"]",
];

pub const DATE_SELECTORS: &[&str] = &[
    ".eventTime",
    "div.contentEvento > div.eventTime",
];

pub const PRICE_SELECTORS: &[&str] = &["ul.evt_ticket > li", "#prztime li", "#evt_ticket li"];

pub const SCHEDULE_SELECTORS: &[&str] = &["ul.evt_time > li > strong", "ul.evt_time", "#evt_time"];

pub const LOCATION_SELECTORS: &[&str] = &[
    "div.luogo_eventi > a > h5",
    ".link_vicinanze .luogo_eventi",
];

pub const ADDRESS_SELECTORS: &[&str] = &["div.luogo_eventi > address", "address"];
