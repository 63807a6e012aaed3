//! Reserved words of the surface language, with stable numeric ids.
//!
//! Ids are assigned in table order starting at 1. Names ending in `(` are
//! built-in functions that take their argument list directly.

use std::collections::HashMap;

use lazy_static::lazy_static;

macro_rules! keywords {
    ($($variant:ident = $name:literal,)+) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Keyword {
            $($variant,)+
        }

        impl Keyword {
            pub const ALL: &'static [Keyword] = &[$(Keyword::$variant,)+];

            pub const fn name(self) -> &'static str {
                match self {
                    $(Keyword::$variant => $name,)+
                }
            }

            pub const fn id(self) -> u16 {
                self as u16 + 1
            }
        }
    };
}

keywords! {
    Again = "AGAIN",
    Array = "ARRAY",
    Assoc = "ASSOC",
    Break = "BREAK",
    Call = "CALL",
    Case = "CASE",
    Class = "CLASS",
    Command = "COMMAND",
    Const = "CONST",
    Continue = "CONTINUE",
    Database = "DATABASE",
    Default = "DEFAULT",
    Define = "DEFINE",
    Delete = "DELETE",
    Destroy = "DESTROY",
    Downto = "DOWNTO",
    Dynamic = "DYNAMIC",
    Else = "ELSE",
    End = "END",
    Endif = "ENDIF",
    Enum = "ENUM",
    Ever = "EVER",
    Export = "EXPORT",
    Extends = "EXTENDS",
    For = "FOR",
    Forever = "FOREVER",
    From = "FROM",
    FromJson = "FROM_JSON(",
    Function = "FUNCTION",
    Gosub = "GOSUB",
    Goto = "GOTO",
    Http = "HTTP(",
    If = "IF",
    Ifdef = "IFDEF",
    Ifndef = "IFNDEF",
    Implements = "IMPLEMENTS",
    Import = "IMPORT",
    In = "IN",
    Include = "INCLUDE",
    Init = "INIT",
    Insert = "INSERT(",
    Let = "LET",
    New = "NEW",
    Property = "PROPERTY",
    Repeat = "REPEAT",
    Result = "RESULT",
    Return = "RETURN",
    Select = "SELECT",
    Status = "STATUS",
    Step = "STEP",
    Switch = "SWITCH",
    To = "TO",
    ToJson = "TO_JSON(",
    Until = "UNTIL",
    Update = "UPDATE",
    Verbatim = "VERBATIM",
    Wend = "WEND",
    While = "WHILE",
}

lazy_static! {
    static ref BY_NAME: HashMap<&'static str, Keyword> =
        Keyword::ALL.iter().map(|kw| (kw.name(), *kw)).collect();
    static ref BY_ID: HashMap<u16, Keyword> =
        Keyword::ALL.iter().map(|kw| (kw.id(), *kw)).collect();
}

impl Keyword {
    /// Exact, case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Keyword> {
        BY_NAME.get(name).copied()
    }

    pub fn from_id(id: u16) -> Option<Keyword> {
        BY_ID.get(&id).copied()
    }
}

pub fn find_id_by_name(name: &str) -> Option<u16> {
    Keyword::from_name(name).map(Keyword::id)
}

pub fn find_name_by_id(id: u16) -> Option<&'static str> {
    Keyword::from_id(id).map(Keyword::name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn table_is_complete_and_sorted() {
        assert_eq!(Keyword::ALL.len(), 58);
        assert!(Keyword::ALL
            .windows(2)
            .all(|pair| pair[0].name() < pair[1].name()));
    }

    #[test]
    fn lookups_agree() {
        for kw in Keyword::ALL {
            assert_eq!(find_name_by_id(find_id_by_name(kw.name()).unwrap()), Some(kw.name()));
        }
        assert_eq!(find_id_by_name("AGAIN"), Some(1));
        assert_eq!(find_name_by_id(58), Some("WHILE"));
        assert_eq!(find_id_by_name("FROM_JSON("), Some(Keyword::FromJson.id()));
    }

    #[test]
    fn misses() {
        assert_eq!(find_id_by_name("again"), None);
        assert_eq!(find_id_by_name("FROM_JSON"), None);
        assert_eq!(find_name_by_id(0), None);
        assert_eq!(find_name_by_id(59), None);
    }
}
