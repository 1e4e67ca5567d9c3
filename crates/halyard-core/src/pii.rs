//! PII firewall — byte-level scanners for five PII categories plus redaction.
//!
//! No regex: each category is a hand-rolled forward scan. `scan` returns a
//! bounded match list; `redact` splices `[REDACTED]` over each match,
//! coalescing overlaps by skipping any match whose offset precedes the
//! current write cursor.
//!
//! The IPv4 scanner flags every syntactically valid IPv4 literal,
//! including loopback and private ranges — no allowlist of "common
//! non-PII" addresses is applied.

/// Maximum number of matches returned by a single [`scan`] call.
pub const MAX_MATCHES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Email,
    Phone,
    Ssn,
    CreditCard,
    Ipv4,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Email => "email",
            Category::Phone => "phone",
            Category::Ssn => "ssn",
            Category::CreditCard => "credit_card",
            Category::Ipv4 => "ip_address",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiiMatch {
    pub category: Category,
    pub offset: usize,
    pub len: usize,
}

/// Bitmask of categories to scan for — all five by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Categories {
    pub email: bool,
    pub phone: bool,
    pub ssn: bool,
    pub credit_card: bool,
    pub ipv4: bool,
}

impl Default for Categories {
    fn default() -> Self {
        Self {
            email: true,
            phone: true,
            ssn: true,
            credit_card: true,
            ipv4: true,
        }
    }
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

fn is_alnum(c: u8) -> bool {
    is_digit(c) || is_alpha(c)
}

fn scan_emails(data: &[u8], out: &mut Vec<PiiMatch>) {
    let len = data.len();
    let mut i = 1usize;
    while i < len {
        if data[i] != b'@' {
            i += 1;
            continue;
        }
        let mut start = i;
        while start > 0 {
            let c = data[start - 1];
            if is_alnum(c) || c == b'.' || c == b'_' || c == b'+' || c == b'-' {
                start -= 1;
            } else {
                break;
            }
        }
        if start == i {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        let mut has_dot = false;
        while end < len {
            let c = data[end];
            if is_alnum(c) || c == b'-' {
                end += 1;
            } else if c == b'.' && end + 1 < len && is_alnum(data[end + 1]) {
                has_dot = true;
                end += 1;
            } else {
                break;
            }
        }
        if !has_dot || end - i < 4 {
            i += 1;
            continue;
        }
        if out.len() < MAX_MATCHES {
            out.push(PiiMatch {
                category: Category::Email,
                offset: start,
                len: end - start,
            });
        }
        i = end;
    }
}

fn scan_phones(data: &[u8], out: &mut Vec<PiiMatch>) {
    let len = data.len();
    let mut i = 0usize;
    while i < len {
        let start = i;
        let mut digit_count = 0u32;
        let mut j = i;
        if j < len && data[j] == b'+' {
            j += 1;
        }
        while j < len && digit_count < 15 {
            let c = data[j];
            if is_digit(c) {
                digit_count += 1;
                j += 1;
            } else if matches!(c, b'-' | b' ' | b'.' | b'(' | b')') {
                j += 1;
            } else {
                break;
            }
        }
        if (10..=15).contains(&digit_count) {
            let before_ok = start == 0 || !is_alnum(data[start - 1]);
            let after_ok = j >= len || !is_alnum(data[j]);
            if before_ok && after_ok {
                if out.len() < MAX_MATCHES {
                    out.push(PiiMatch {
                        category: Category::Phone,
                        offset: start,
                        len: j - start,
                    });
                }
                i = j;
                continue;
            }
        }
        i += 1;
    }
}

fn scan_ssns(data: &[u8], out: &mut Vec<PiiMatch>) {
    let len = data.len();
    if len < 11 {
        return;
    }
    let mut i = 0usize;
    while i <= len - 11 {
        let is_pattern = is_digit(data[i])
            && is_digit(data[i + 1])
            && is_digit(data[i + 2])
            && data[i + 3] == b'-'
            && is_digit(data[i + 4])
            && is_digit(data[i + 5])
            && data[i + 6] == b'-'
            && is_digit(data[i + 7])
            && is_digit(data[i + 8])
            && is_digit(data[i + 9])
            && is_digit(data[i + 10]);
        if !is_pattern {
            i += 1;
            continue;
        }
        if i > 0 && is_digit(data[i - 1]) {
            i += 1;
            continue;
        }
        if i + 11 < len && is_digit(data[i + 11]) {
            i += 1;
            continue;
        }
        let area = (data[i] - b'0') as u32 * 100 + (data[i + 1] - b'0') as u32 * 10 + (data[i + 2] - b'0') as u32;
        if area == 0 || area == 666 || area >= 900 {
            i += 1;
            continue;
        }
        if out.len() < MAX_MATCHES {
            out.push(PiiMatch {
                category: Category::Ssn,
                offset: i,
                len: 11,
            });
        }
        i += 11;
    }
}

/// Luhn checksum over a run of ASCII digit bytes.
fn luhn_check(digits: &[u8]) -> bool {
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }
    let mut sum = 0i32;
    let mut alt = false;
    for &b in digits.iter().rev() {
        let mut d = (b - b'0') as i32;
        if alt {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        alt = !alt;
    }
    sum % 10 == 0
}

fn scan_credit_cards(data: &[u8], out: &mut Vec<PiiMatch>) {
    let len = data.len();
    let mut i = 0usize;
    while i < len {
        if !is_digit(data[i]) {
            i += 1;
            continue;
        }
        if i > 0 && is_alnum(data[i - 1]) {
            i += 1;
            continue;
        }
        let mut digits = Vec::with_capacity(20);
        let mut j = i;
        while j < len && digits.len() < 20 {
            let c = data[j];
            if is_digit(c) {
                digits.push(c);
                j += 1;
            } else if c == b' ' || c == b'-' {
                j += 1;
            } else {
                break;
            }
        }
        if (13..=19).contains(&digits.len()) {
            if j < len && is_alnum(data[j]) {
                i += 1;
                continue;
            }
            if luhn_check(&digits) {
                if out.len() < MAX_MATCHES {
                    out.push(PiiMatch {
                        category: Category::CreditCard,
                        offset: i,
                        len: j - i,
                    });
                }
                i = j;
                continue;
            }
        }
        i += 1;
    }
}

fn scan_ipv4(data: &[u8], out: &mut Vec<PiiMatch>) {
    let len = data.len();
    let mut i = 0usize;
    while i < len {
        if !is_digit(data[i]) {
            i += 1;
            continue;
        }
        if i > 0 && (is_alnum(data[i - 1]) || data[i - 1] == b'.') {
            i += 1;
            continue;
        }
        let start = i;
        let mut j = i;
        let mut octets = 0u32;
        for oct in 0..4 {
            let mut val: u32 = 0;
            let mut digits = 0u32;
            while j < len && is_digit(data[j]) && digits < 3 {
                val = val * 10 + (data[j] - b'0') as u32;
                j += 1;
                digits += 1;
            }
            if digits == 0 || val > 255 {
                break;
            }
            octets += 1;
            if oct < 3 {
                if j >= len || data[j] != b'.' {
                    break;
                }
                j += 1;
            }
        }
        if octets == 4 {
            if j < len && (is_digit(data[j]) || data[j] == b'.') {
                i += 1;
                continue;
            }
            if out.len() < MAX_MATCHES {
                out.push(PiiMatch {
                    category: Category::Ipv4,
                    offset: start,
                    len: j - start,
                });
            }
            i = j;
            continue;
        }
        i += 1;
    }
}

/// Scan `text` for every enabled category, returning matches in scan order
/// (not necessarily offset order — see [`redact`], which sorts first).
pub fn scan(text: &[u8], categories: Categories) -> Vec<PiiMatch> {
    let mut out = Vec::new();
    if text.is_empty() {
        return out;
    }
    if categories.email {
        scan_emails(text, &mut out);
    }
    if categories.phone {
        scan_phones(text, &mut out);
    }
    if categories.ssn {
        scan_ssns(text, &mut out);
    }
    if categories.credit_card {
        scan_credit_cards(text, &mut out);
    }
    if categories.ipv4 {
        scan_ipv4(text, &mut out);
    }
    out
}

pub fn contains_pii(text: &[u8], categories: Categories) -> bool {
    !scan(text, categories).is_empty()
}

/// Splice `[REDACTED]` over every match, offset-sorted, coalescing overlaps
/// by skipping any match whose start precedes the current write cursor.
pub fn redact(text: &[u8], categories: Categories) -> String {
    let mut matches = scan(text, categories);
    if matches.is_empty() {
        return String::from_utf8_lossy(text).into_owned();
    }
    matches.sort_by_key(|m| m.offset);

    let mut out = String::with_capacity(text.len());
    let mut src = 0usize;
    for m in &matches {
        if m.offset < src {
            continue; // overlapping match — already covered
        }
        out.push_str(&String::from_utf8_lossy(&text[src..m.offset]));
        out.push_str("[REDACTED]");
        src = m.offset + m.len;
    }
    if src < text.len() {
        out.push_str(&String::from_utf8_lossy(&text[src..]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> Categories {
        Categories::default()
    }

    #[test]
    fn detects_email() {
        let m = scan(b"contact jane.doe+x@example.co.uk now", all());
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].category, Category::Email);
    }

    #[test]
    fn detects_phone_with_separators() {
        let m = scan(b"call +1 (234) 567-8901 please", all());
        assert!(m.iter().any(|x| x.category == Category::Phone));
    }

    #[test]
    fn detects_ssn_and_rejects_bad_area() {
        assert!(scan(b"ssn 219-09-9999 on file", all())
            .iter()
            .any(|m| m.category == Category::Ssn));
        assert!(!scan(b"000-12-3456", all())
            .iter()
            .any(|m| m.category == Category::Ssn));
        assert!(!scan(b"901-12-3456", all())
            .iter()
            .any(|m| m.category == Category::Ssn));
    }

    #[test]
    fn detects_luhn_valid_credit_card() {
        // Well-known Luhn-valid test number.
        let m = scan(b"card 4532015112830366 on file", all());
        assert!(m.iter().any(|x| x.category == Category::CreditCard));
        // Same digits with one flipped fails Luhn.
        assert!(!scan(b"card 4532015112830367 on file", all())
            .iter()
            .any(|x| x.category == Category::CreditCard));
    }

    #[test]
    fn detects_ipv4_without_filtering_special_ranges() {
        for ip in ["0.0.0.0", "127.0.0.1", "255.255.255.255", "10.0.0.5"] {
            let text = format!("addr={ip} end");
            assert!(
                scan(text.as_bytes(), all()).iter().any(|m| m.category == Category::Ipv4),
                "expected {ip} to be flagged"
            );
        }
        assert!(!scan(b"300.1.1.1 is not an ip", all())
            .iter()
            .any(|m| m.category == Category::Ipv4));
    }

    #[test]
    fn redact_removes_every_category_and_is_idempotent_on_rescan() {
        let text = b"Email jane@example.com phone 415-555-0199 card 4532015112830366 ip 10.0.0.1 ssn 219-09-9999.";
        let redacted = redact(text, all());
        assert!(!contains_pii(redacted.as_bytes(), all()));
        assert!(!redacted.contains("jane@example.com"));
        assert!(!redacted.contains("4532015112830366"));
    }

    #[test]
    fn reported_offsets_reclassify_in_isolation() {
        let text = b"reach me at jane@example.com today";
        for m in scan(text, all()) {
            let slice = &text[m.offset..m.offset + m.len];
            let isolated = scan(slice, all());
            assert!(isolated.iter().any(|x| x.category == m.category));
        }
    }
}
