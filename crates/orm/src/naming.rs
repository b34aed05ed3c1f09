//! Naming conventions shared by relationship descriptors
//!
//! Remote field names are snake_case derived from PascalCase type names:
//! `SampleType` owns `sample_type_id`, and a collection of `JobAssociation`
//! records lives under `job_associations`.

/// `SampleType` -> `sample_type`
pub fn underscore(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else if c == '-' || c == ' ' {
            result.push('_');
        } else {
            result.push(c);
        }
    }

    result
}

/// Simple pluralization (English-centric)
pub fn pluralize(name: &str) -> String {
    if name.ends_with('y')
        && !name.ends_with("ay")
        && !name.ends_with("ey")
        && !name.ends_with("oy")
        && !name.ends_with("uy")
    {
        format!("{}ies", &name[..name.len() - 1])
    } else if name.ends_with('s')
        || name.ends_with("sh")
        || name.ends_with("ch")
        || name.ends_with('x')
        || name.ends_with('z')
    {
        format!("{}es", name)
    } else {
        format!("{}s", name)
    }
}

/// Foreign key a record carries to point at `type_name`: `SampleType` -> `sample_type_id`
pub fn foreign_key(type_name: &str) -> String {
    format!("{}_id", underscore(type_name))
}

/// Default relationship name for a collection of `type_name` records
pub fn collection_name(type_name: &str) -> String {
    pluralize(&underscore(type_name))
}
