use std::fmt;

use serde::{Deserialize, Serialize};

/// Chromium core page transition type.
///
/// Qualifier bits (redirects, back/forward, ...) are not part of this type;
/// exports only carry the core type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageTransition {
    Link,
    Typed,
    AutoBookmark,
    AutoSubframe,
    ManualSubframe,
    Generated,
    AutoToplevel,
    FormSubmit,
    Reload,
    Keyword,
    KeywordGenerated,
}

impl PageTransition {
    pub const ALL: [PageTransition; 11] = [
        PageTransition::Link,
        PageTransition::Typed,
        PageTransition::AutoBookmark,
        PageTransition::AutoSubframe,
        PageTransition::ManualSubframe,
        PageTransition::Generated,
        PageTransition::AutoToplevel,
        PageTransition::FormSubmit,
        PageTransition::Reload,
        PageTransition::Keyword,
        PageTransition::KeywordGenerated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PageTransition::Link => "link",
            PageTransition::Typed => "typed",
            PageTransition::AutoBookmark => "auto_bookmark",
            PageTransition::AutoSubframe => "auto_subframe",
            PageTransition::ManualSubframe => "manual_subframe",
            PageTransition::Generated => "generated",
            PageTransition::AutoToplevel => "auto_toplevel",
            PageTransition::FormSubmit => "form_submit",
            PageTransition::Reload => "reload",
            PageTransition::Keyword => "keyword",
            PageTransition::KeywordGenerated => "keyword_generated",
        }
    }

    /// Core type of a raw Chromium transition value, qualifiers masked off.
    pub fn from_raw(transition: i64) -> Option<Self> {
        let core = (transition & 0xFF) as usize;
        Self::ALL.get(core).copied()
    }
}

impl fmt::Display for PageTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
