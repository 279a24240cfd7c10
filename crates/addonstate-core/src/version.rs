use std::cmp::Ordering;

/// Compares two toolkit version strings.
///
/// Versions are dot separated parts. Each part reads as
/// `<number-a><string-b><number-c><extra-d>`; a missing part compares as `0`,
/// a part starting with `*` is larger than any number, and a `+` directly after
/// `number-a` means "the pre-release of `number-a + 1`". An empty string part
/// sorts after a non-empty one, so `1.0` is newer than `1.0pre`.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let mut left_parts = left.split('.');
    let mut right_parts = right.split('.');

    loop {
        let (left_part, right_part) = match (left_parts.next(), right_parts.next()) {
            (None, None) => return Ordering::Equal,
            (left_part, right_part) => (left_part.unwrap_or(""), right_part.unwrap_or("")),
        };

        let ordering = VersionPart::parse(left_part).cmp_part(&VersionPart::parse(right_part));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct VersionPart<'a> {
    number_a: i64,
    string_b: PartString<'a>,
    number_c: i64,
    extra_d: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
enum PartString<'a> {
    Borrowed(&'a str),
    Pre,
}

impl PartString<'_> {
    fn as_str(&self) -> &str {
        match self {
            Self::Borrowed(value) => value,
            Self::Pre => "pre",
        }
    }
}

impl<'a> VersionPart<'a> {
    fn parse(part: &'a str) -> Self {
        if part.is_empty() {
            return Self::zero();
        }

        if part.starts_with('*') {
            return Self {
                number_a: i64::from(i32::MAX),
                ..Self::zero()
            };
        }

        let (number_a, rest) = split_number(part);
        if let Some(rest) = rest.strip_prefix('+') {
            return Self {
                number_a: number_a.saturating_add(1),
                string_b: PartString::Pre,
                number_c: 0,
                extra_d: rest,
            };
        }

        let string_end = rest
            .find(|ch: char| ch.is_ascii_digit() || ch == '+' || ch == '-')
            .unwrap_or(rest.len());
        let (string_b, rest) = rest.split_at(string_end);
        let (number_c, extra_d) = split_number(rest);

        Self {
            number_a,
            string_b: PartString::Borrowed(string_b),
            number_c,
            extra_d,
        }
    }

    fn zero() -> Self {
        Self {
            number_a: 0,
            string_b: PartString::Borrowed(""),
            number_c: 0,
            extra_d: "",
        }
    }

    fn cmp_part(&self, other: &Self) -> Ordering {
        self.number_a
            .cmp(&other.number_a)
            .then_with(|| compare_string_part(self.string_b.as_str(), other.string_b.as_str()))
            .then_with(|| self.number_c.cmp(&other.number_c))
            .then_with(|| compare_string_part(self.extra_d, other.extra_d))
    }
}

fn split_number(value: &str) -> (i64, &str) {
    let bytes = value.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }

    let digits = &value[..end];
    let number = digits.parse::<i64>().unwrap_or(0);
    (number, &value[end..])
}

fn compare_string_part(left: &str, right: &str) -> Ordering {
    match (left.is_empty(), right.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => left.cmp(right),
    }
}
