//! Identifier canonicalisation and reserved-name mangling.
//!
//! Every key stored in a symbol table is canonical lowercase. User-written
//! identifiers are the strict Fortran rule (ASCII letter first, then
//! letters/digits/underscore); compiler-generated keys may additionally use
//! `~` and `@`, which no user identifier can contain, so mangled names can
//! never collide with source names.

/// Suffix reserved for compiler-generated symbols.
pub const RESERVED_SUFFIX: &str = "__lcompilers";

/// Formal-argument name of the entry-point discriminator in rewritten
/// ENTRY masters.
pub const ENTRY_SELECTOR: &str = "entry__lcompilers";

/// Canonical (lowercase) form of a name. Idempotent.
pub fn canonical(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Whether `name` is a valid user-written identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether `name` is storable as a symbol-table key: a canonical user
/// identifier or one of the mangled forms.
pub fn is_valid_key(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '~' || c == '@'
        })
}

/// Symbol-table key for a user-defined operator. Accepts the operator name
/// with or without its surrounding dots: `.cross.` and `cross` both map to
/// `~~cross~~`.
pub fn defined_operator_key(op: &str) -> String {
    format!("~~{}~~", canonical(op.trim_matches('.')))
}

pub fn is_defined_operator_key(name: &str) -> bool {
    name.len() > 4 && name.starts_with("~~") && name.ends_with("~~")
}

/// Symbol-table key for an intrinsic-operator overload set, e.g. `~add`.
pub fn operator_aggregate_key(tag: &str) -> String {
    format!("~{tag}")
}

/// Symbol-table key for the assignment overload set.
pub fn assignment_key() -> String {
    operator_aggregate_key("assign")
}

/// Local name for a private procedure imported through a public aggregate.
pub fn indirect_import_key(proc_name: &str, aggregate: &str) -> String {
    format!("{}@{}", canonical(proc_name), canonical(aggregate))
}

/// Rename applied to a constituent procedure whose name collides with the
/// aggregate being emitted over it.
pub fn renamed_constituent(name: &str) -> String {
    format!("{}{}", canonical(name), RESERVED_SUFFIX)
}

/// Master-function name produced by ENTRY rewriting.
pub fn entry_master_name(procedure: &str) -> String {
    format!("{}_main{}", canonical(procedure), RESERVED_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_is_idempotent() {
        for name in ["Foo", "FOO_bar", "already_lower", "X1"] {
            let once = canonical(name);
            assert_eq!(canonical(&once), once);
        }
    }

    #[test]
    fn identifier_validity() {
        assert!(is_valid_identifier("foo"));
        assert!(is_valid_identifier("F00_bar"));
        assert!(is_valid_identifier("_hidden"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1foo"));
        assert!(!is_valid_identifier("foo-bar"));
        assert!(!is_valid_identifier("f oo"));
        assert!(!is_valid_identifier("~add"));
    }

    #[test]
    fn key_validity_accepts_mangled_forms() {
        assert!(is_valid_key("foo_bar"));
        assert!(is_valid_key("~add"));
        assert!(is_valid_key("~~cross~~"));
        assert!(is_valid_key("helper@plus"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("Foo"));
        assert!(!is_valid_key("a b"));
    }

    #[test]
    fn operator_keys() {
        assert_eq!(defined_operator_key(".Cross."), "~~cross~~");
        assert_eq!(defined_operator_key("cross"), "~~cross~~");
        assert!(is_defined_operator_key("~~cross~~"));
        assert!(!is_defined_operator_key("~add"));
        assert_eq!(operator_aggregate_key("add"), "~add");
        assert_eq!(assignment_key(), "~assign");
    }

    #[test]
    fn mangling() {
        assert_eq!(indirect_import_key("pImpl", "Plus"), "pimpl@plus");
        assert_eq!(renamed_constituent("plus"), "plus__lcompilers");
        assert_eq!(entry_master_name("S"), "s_main__lcompilers");
    }
}
