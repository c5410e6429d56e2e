//! Static word data: theme word lists, nickname parts and player emoji

pub struct Theme {
    pub name: &'static str,
    pub words: &'static [&'static str],
}

pub const THEMES: &[Theme] = &[
    Theme {
        name: "Nature",
        words: &[
            "Waterfall", "Mountain", "Volcano", "Glacier", "Forest", "Desert", "Canyon", "Ocean",
            "Cave", "Island",
        ],
    },
    Theme {
        name: "Food",
        words: &[
            "Pizza", "Sushi", "Burger", "Taco", "Pasta", "Steak", "Salad", "Ramen", "Burrito",
            "Waffle",
        ],
    },
    Theme {
        name: "Travel",
        words: &[
            "Passport", "Suitcase", "Airplane", "Train", "Backpack", "Hotel", "Compass", "Cruise",
            "Subway", "Ticket",
        ],
    },
    Theme {
        name: "Hollywood",
        words: &[
            "Director", "Oscars", "Camera", "Script", "Stuntman", "Celebrity", "Premiere",
            "Audition", "Makeup", "Casting",
        ],
    },
];

pub const COLORS: &[&str] = &[
    "Crimson", "Azure", "Emerald", "Golden", "Silver", "Amber", "Violet", "Cyan", "Indigo",
    "Coral", "Teal", "Onyx", "Pearl", "Sage", "Ruby", "Sapphire",
];

pub const ANIMALS: &[&str] = &[
    "Heron", "Falcon", "Lynx", "Panda", "Otter", "Badger", "Wolf", "Eagle", "Dolphin", "Tiger",
    "Fox", "Raven", "Bear", "Owl", "Stag", "Cobra",
];

const PLAYER_EMOJIS: &[&str] = &[
    "🦊", "🐼", "🦁", "🐯", "🐺", "🦅", "🦉", "🐙", "🦋", "🐬", "🦈", "🐢", "🦩", "🦚", "🐍", "🦎",
];

/// Find a theme by name, ignoring ASCII case
pub fn find_theme(name: &str) -> Option<&'static Theme> {
    THEMES.iter().find(|t| t.name.eq_ignore_ascii_case(name.trim()))
}

pub fn theme_names() -> impl Iterator<Item = &'static str> {
    THEMES.iter().map(|t| t.name)
}

pub fn player_emoji(join_index: u32) -> &'static str {
    PLAYER_EMOJIS[join_index as usize % PLAYER_EMOJIS.len()]
}
