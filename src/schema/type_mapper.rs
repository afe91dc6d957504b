//! Attribute syntax → semantic column type.
//!
//! Two fixed tables: syntax code → syntax name, then syntax name → (type, indexed).
//! Only syntaxes that need non-default typing appear in the second table;
//! everything else, including absent codes, falls back to `UnknownType`.

use super::types::SemanticType;

/// Directory attribute syntaxes (OIDs 2.5.5.1 to 2.5.5.17).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeSyntax {
    DN,
    OID,
    CaseExactString,
    CaseIgnoreString,
    IA5String,
    NumericString,
    DNWithBinary,
    Boolean,
    Enumeration,
    OctetString,
    GeneralizedTime,
    /// Multiple values are separated by ';' when not single valued
    DirectoryString,
    PresentationAddress,
    DNWithString,
    NTSecurityDescriptor,
    Integer8,
    Sid,
}

impl AttributeSyntax {
    pub fn from_code(code: i64) -> Option<Self> {
        let syntax = match code {
            0x80001 => AttributeSyntax::DN,
            0x80002 => AttributeSyntax::OID,
            0x80003 => AttributeSyntax::CaseExactString,
            0x80004 => AttributeSyntax::CaseIgnoreString,
            0x80005 => AttributeSyntax::IA5String,
            0x80006 => AttributeSyntax::NumericString,
            0x80007 => AttributeSyntax::DNWithBinary,
            0x80008 => AttributeSyntax::Boolean,
            0x80009 => AttributeSyntax::Enumeration,
            0x8000a => AttributeSyntax::OctetString,
            0x8000b => AttributeSyntax::GeneralizedTime,
            0x8000c => AttributeSyntax::DirectoryString,
            0x8000d => AttributeSyntax::PresentationAddress,
            0x8000e => AttributeSyntax::DNWithString,
            0x8000f => AttributeSyntax::NTSecurityDescriptor,
            0x80010 => AttributeSyntax::Integer8,
            0x80011 => AttributeSyntax::Sid,
            _ => return None,
        };
        Some(syntax)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeSyntax::DN => "DN",
            AttributeSyntax::OID => "OID",
            AttributeSyntax::CaseExactString => "CaseExactString",
            AttributeSyntax::CaseIgnoreString => "CaseIgnoreString",
            AttributeSyntax::IA5String => "IA5String",
            AttributeSyntax::NumericString => "NumericString",
            AttributeSyntax::DNWithBinary => "DNWithBinary",
            AttributeSyntax::Boolean => "Boolean",
            AttributeSyntax::Enumeration => "Enumeration",
            AttributeSyntax::OctetString => "OctetString",
            AttributeSyntax::GeneralizedTime => "GeneralizedTime",
            AttributeSyntax::DirectoryString => "DirectoryString",
            AttributeSyntax::PresentationAddress => "PresentationAddress",
            AttributeSyntax::DNWithString => "DNWithString",
            AttributeSyntax::NTSecurityDescriptor => "NTSecurityDescriptor",
            AttributeSyntax::Integer8 => "Integer8",
            AttributeSyntax::Sid => "Sid",
        }
    }

    /// Explicit typing for the syntaxes that need it.
    fn column_type(&self) -> Option<(SemanticType, bool)> {
        match self {
            AttributeSyntax::DN => Some((SemanticType::Text, false)),
            AttributeSyntax::OID => Some((SemanticType::Text, false)),
            AttributeSyntax::CaseExactString => Some((SemanticType::Text, false)),
            AttributeSyntax::GeneralizedTime => Some((SemanticType::Timestamp, false)),
            AttributeSyntax::Integer8 => Some((SemanticType::Int, false)),
            AttributeSyntax::NTSecurityDescriptor => Some((SemanticType::NTSecDesc, true)),
            _ => None,
        }
    }
}

/// Map a (possibly absent) syntax code to `(semantic type, indexed)`.
///
/// Total over all inputs: unknown codes and syntaxes without explicit typing
/// resolve to `(UnknownType, false)`.
pub fn syntax_to_type(code: Option<i64>) -> (SemanticType, bool) {
    code.and_then(AttributeSyntax::from_code)
        .and_then(|syntax| syntax.column_type())
        .unwrap_or((SemanticType::UnknownType, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicitly_typed_syntaxes() {
        assert_eq!(syntax_to_type(Some(0x8000b)), (SemanticType::Timestamp, false));
        assert_eq!(syntax_to_type(Some(0x80010)), (SemanticType::Int, false));
        assert_eq!(syntax_to_type(Some(0x8000f)), (SemanticType::NTSecDesc, true));
        assert_eq!(syntax_to_type(Some(0x80001)), (SemanticType::Text, false));
    }

    #[test]
    fn test_known_syntax_without_typing_falls_back() {
        assert_eq!(
            AttributeSyntax::from_code(0x80004).map(|s| s.name()),
            Some("CaseIgnoreString")
        );
        assert_eq!(syntax_to_type(Some(0x80004)), (SemanticType::UnknownType, false));
    }

    #[test]
    fn test_unknown_and_absent_codes() {
        assert_eq!(syntax_to_type(Some(0x80012)), (SemanticType::UnknownType, false));
        assert_eq!(syntax_to_type(Some(-1)), (SemanticType::UnknownType, false));
        assert_eq!(syntax_to_type(None), (SemanticType::UnknownType, false));
    }

    #[test]
    fn test_every_code_in_range_has_a_name() {
        for code in 0x80001..=0x80011 {
            assert!(AttributeSyntax::from_code(code).is_some(), "code {:#x}", code);
        }
    }
}
