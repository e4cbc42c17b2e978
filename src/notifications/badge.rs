const GLYPHS: [&str; 21] = [
    "⓿", "➊", "➋", "➌", "➍", "➎", "➏", "➐", "➑", "➒", "➓", "⓫", "⓬", "⓭", "⓮", "⓯", "⓰", "⓱",
    "⓲", "⓳", "⓴",
];

pub const DEFAULT_APP_NAME: &str = "...";

/// Window title carrying the unread ticket count.
pub fn window_title(count: usize, app_name: &str) -> String {
    let app = if app_name.trim().is_empty() {
        DEFAULT_APP_NAME
    } else {
        app_name
    };

    match count {
        0 => app.to_string(),
        n if n < GLYPHS.len() => format!("{} - {}", GLYPHS[n], app),
        n => format!("({}){}", n, app),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub title: String,
    pub favicon_count: usize,
}

impl Badge {
    pub fn new(count: usize, app_name: &str) -> Self {
        Self {
            title: window_title(count, app_name),
            favicon_count: count,
        }
    }
}
