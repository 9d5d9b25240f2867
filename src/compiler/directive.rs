//! Directive names and per-node directive classification.

use bitflags::bitflags;

/// A directive attribute, by name (prefix already removed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum DirectiveKind {
    Text,
    Html,
    Show,
    If,
    El,
    Model,
    For,
    /// `on:EVENT` carries the event name, bare `on` takes an object literal.
    On(Option<String>),
    /// `bind:ATTR` carries the attribute name, bare `bind` takes an object literal.
    Bind(Option<String>),
    Unknown(String),
}

bitflags! {
    /// Directive classes present on one node.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct DirectiveFlags: u16 {
        const INTERPOLATION = 1 << 0;
        const TEXT = 1 << 1;
        const HTML = 1 << 2;
        const SHOW = 1 << 3;
        const IF = 1 << 4;
        const EL = 1 << 5;
        const MODEL = 1 << 6;
        const FOR = 1 << 7;
        const ON = 1 << 8;
        const BIND = 1 << 9;
        const UNKNOWN = 1 << 10;

        /// Sections whose children compile only after the directive resolves.
        const LATE = Self::IF.bits() | Self::FOR.bits();
    }
}

impl DirectiveKind {
    pub fn parse(name: &str) -> Self {
        let (head, suffix) = match name.split_once(':') {
            Some((head, suffix)) => (head, Some(suffix.trim().to_string())),
            None => (name, None),
        };

        match (head, suffix) {
            ("text", None) => DirectiveKind::Text,
            ("html", None) => DirectiveKind::Html,
            ("show", None) => DirectiveKind::Show,
            ("if", None) => DirectiveKind::If,
            ("el", None) => DirectiveKind::El,
            ("model", None) => DirectiveKind::Model,
            ("for", None) => DirectiveKind::For,
            ("on", suffix) => DirectiveKind::On(suffix.filter(|s| !s.is_empty())),
            ("bind", suffix) => DirectiveKind::Bind(suffix.filter(|s| !s.is_empty())),
            _ => DirectiveKind::Unknown(name.to_string()),
        }
    }

    pub fn flag(&self) -> DirectiveFlags {
        match self {
            DirectiveKind::Text => DirectiveFlags::TEXT,
            DirectiveKind::Html => DirectiveFlags::HTML,
            DirectiveKind::Show => DirectiveFlags::SHOW,
            DirectiveKind::If => DirectiveFlags::IF,
            DirectiveKind::El => DirectiveFlags::EL,
            DirectiveKind::Model => DirectiveFlags::MODEL,
            DirectiveKind::For => DirectiveFlags::FOR,
            DirectiveKind::On(_) => DirectiveFlags::ON,
            DirectiveKind::Bind(_) => DirectiveFlags::BIND,
            DirectiveKind::Unknown(_) => DirectiveFlags::UNKNOWN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!(DirectiveKind::parse("text"), DirectiveKind::Text);
        assert_eq!(DirectiveKind::parse("for"), DirectiveKind::For);
        assert_eq!(
            DirectiveKind::parse("on:click"),
            DirectiveKind::On(Some("click".into()))
        );
        assert_eq!(DirectiveKind::parse("bind"), DirectiveKind::Bind(None));
        assert_eq!(
            DirectiveKind::parse("frobnicate"),
            DirectiveKind::Unknown("frobnicate".into())
        );
        assert_eq!(
            DirectiveKind::parse("text:x"),
            DirectiveKind::Unknown("text:x".into())
        );
    }

    #[test]
    fn test_late_flags() {
        assert!(DirectiveKind::If.flag().intersects(DirectiveFlags::LATE));
        assert!(DirectiveKind::For.flag().intersects(DirectiveFlags::LATE));
        assert!(!DirectiveKind::Show.flag().intersects(DirectiveFlags::LATE));
    }
}
