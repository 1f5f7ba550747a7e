// ABOUTME: Identifier validation and quoting shared by catalog and SQL builders
// ABOUTME: Keeps catalog-supplied names safe to splice into generated statements

use anyhow::{bail, Result};

/// Maximum identifier length accepted in a catalog (PostgreSQL's NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Validate a table, column or index name taken from a catalog
///
/// Identifiers must:
/// - Be 1-63 characters long
/// - Start with a letter (a-z, A-Z) or underscore (_)
/// - Contain only letters, digits (0-9), or underscores
///
/// Generated statements quote every identifier with [`quote_ident`], but catalogs are
/// external input, so names are still held to the portable subset both dialects accept
/// without surprises.
///
/// # Examples
///
/// ```
/// # use schema_backup::utils::validate_identifier;
/// assert!(validate_identifier("learned_words").is_ok());
/// assert!(validate_identifier("123abc").is_err());
/// assert!(validate_identifier("words\"; DROP TABLE words; --").is_err());
/// ```
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.trim().is_empty() {
        bail!("Identifier cannot be empty or whitespace-only");
    }

    if identifier.len() > MAX_IDENTIFIER_LEN {
        bail!(
            "Identifier '{}' exceeds maximum length of {} characters (got {})",
            sanitize_identifier(identifier),
            MAX_IDENTIFIER_LEN,
            identifier.len()
        );
    }

    let mut chars = identifier.chars();
    if let Some(first) = chars.next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            bail!(
                "Identifier '{}' must start with a letter or underscore, not '{}'",
                sanitize_identifier(identifier),
                first
            );
        }
    }

    for (i, c) in identifier.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            bail!(
                "Identifier '{}' contains invalid character '{}' at position {}. \
                 Only letters, digits, and underscores are allowed",
                sanitize_identifier(identifier),
                if c.is_control() {
                    format!("\\x{:02x}", c as u32)
                } else {
                    c.to_string()
                },
                i
            );
        }
    }

    Ok(())
}

/// Sanitize an identifier for display in logs and error messages
///
/// Removes control characters and caps the length at 100 characters.
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}

/// Quote an identifier for use in SQL
///
/// Both SQLite and PostgreSQL accept standard double-quoted identifiers; embedded quotes
/// are doubled.
///
/// ```
/// # use schema_backup::utils::quote_ident;
/// assert_eq!(quote_ident("words"), "\"words\"");
/// assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
/// ```
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quote and comma-join a list of identifiers
pub fn quote_ident_list<S: AsRef<str>>(identifiers: &[S]) -> String {
    identifiers
        .iter()
        .map(|ident| quote_ident(ident.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
