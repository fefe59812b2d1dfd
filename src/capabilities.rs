//! # Codec Capabilities
//!
//! Lookups the analysis codec delegates instead of owning: the transition
//! string table, the public suffix list and the page title policy. The
//! defaults are what real exports need; tests substitute fixtures.

use std::sync::Arc;

use psl::Psl;

use crate::transition::PageTransition;

/// String form of core page transition types.
pub trait TransitionCodec: Send + Sync {
    fn decode(&self, value: &str) -> Option<PageTransition>;
    fn encode(&self, transition: PageTransition) -> String;
}

/// Registrable domain (eTLD+1) of a hostname.
pub trait DomainResolver: Send + Sync {
    fn registrable_domain(&self, host: &str) -> Option<String>;
}

/// Page title cleanup. Must be idempotent.
pub trait TitleNormalizer: Send + Sync {
    fn normalize(&self, title: &str) -> String;
}

/// Chromium's lower-case transition names.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeTransitions;

impl TransitionCodec for ChromeTransitions {
    fn decode(&self, value: &str) -> Option<PageTransition> {
        PageTransition::ALL.into_iter().find(|t| t.as_str() == value)
    }

    fn encode(&self, transition: PageTransition) -> String {
        transition.as_str().to_string()
    }
}

/// Mozilla's Public Suffix List, ICANN and private sections.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublicSuffixList;

impl DomainResolver for PublicSuffixList {
    fn registrable_domain(&self, host: &str) -> Option<String> {
        if host.is_empty() || host.starts_with('.') || host.ends_with('.') || host.contains("..") {
            return None;
        }
        psl::List
            .domain(host.as_bytes())
            .and_then(|d| std::str::from_utf8(d.as_bytes()).ok())
            .map(|s| s.to_string())
    }
}

/// Replaces control characters with spaces and trims surrounding whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct ControlCharTitles;

impl TitleNormalizer for ControlCharTitles {
    fn normalize(&self, title: &str) -> String {
        let replaced: String = title
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        replaced.trim().to_string()
    }
}

/// Capability set shared by codec sessions.
#[derive(Clone)]
pub struct Capabilities {
    pub transitions: Arc<dyn TransitionCodec>,
    pub domains: Arc<dyn DomainResolver>,
    pub titles: Arc<dyn TitleNormalizer>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            transitions: Arc::new(ChromeTransitions),
            domains: Arc::new(PublicSuffixList),
            titles: Arc::new(ControlCharTitles),
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("transitions", &"<dyn TransitionCodec>")
            .field("domains", &"<dyn DomainResolver>")
            .field("titles", &"<dyn TitleNormalizer>")
            .finish()
    }
}
