//! Naming inference
//!
//! English-only singular/plural rules, enough for model and association
//! names. Anything irregular beyond the small table below should be
//! declared explicitly with a `provider` or `foreign_key` option.

use convert_case::{Case, Casing};

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
];

const UNCOUNTABLE: &[&str] = &["series", "species", "news", "metadata", "information"];

pub fn snake_case(name: &str) -> String {
    name.to_case(Case::Snake)
}

pub fn pascal_case(name: &str) -> String {
    name.to_case(Case::Pascal)
}

/// Singular form of the last word of a snake_case name.
pub fn singularize(word: &str) -> String {
    let (head, last) = split_last_word(word);
    let lower = last.to_ascii_lowercase();

    let singular = if UNCOUNTABLE.contains(&lower.as_str()) {
        last.to_string()
    } else if let Some((single, _)) = IRREGULAR.iter().find(|(_, plural)| *plural == lower) {
        single.to_string()
    } else if let Some(stem) = lower.strip_suffix("ies").filter(|s| !s.is_empty()) {
        format!("{}y", stem)
    } else if let Some(stem) = ["sses", "shes", "ches", "xes", "zes"]
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
        .map(|_| &lower[..lower.len() - 2])
    {
        stem.to_string()
    } else if lower.ends_with('s') && !lower.ends_with("ss") && lower.len() > 1 {
        lower[..lower.len() - 1].to_string()
    } else {
        last.to_string()
    };
    format!("{}{}", head, singular)
}

/// Plural form of the last word of a snake_case name.
pub fn pluralize(word: &str) -> String {
    let (head, last) = split_last_word(word);
    let lower = last.to_ascii_lowercase();

    let plural = if UNCOUNTABLE.contains(&lower.as_str()) {
        last.to_string()
    } else if let Some((_, plural)) = IRREGULAR.iter().find(|(single, _)| *single == lower) {
        plural.to_string()
    } else if lower.ends_with('y') && !ends_with_vowel_y(&lower) {
        format!("{}ies", &lower[..lower.len() - 1])
    } else if ["s", "sh", "ch", "x", "z"].iter().any(|suffix| lower.ends_with(suffix)) {
        format!("{}es", lower)
    } else {
        format!("{}s", lower)
    };
    format!("{}{}", head, plural)
}

/// Target model for an association name: `comments` -> `Comment`,
/// `blog_posts` -> `BlogPost`, `author` -> `Author`.
pub fn infer_target(association: &str) -> String {
    pascal_case(&singularize(&snake_case(association)))
}

/// Foreign key a belongs-to association stores on its owner.
pub fn belongs_to_key(association: &str) -> String {
    format!("{}_id", snake_case(association))
}

/// Foreign key a has-many association expects on its targets.
pub fn has_many_key(owner_model: &str) -> String {
    format!("{}_id", singularize(&snake_case(owner_model)))
}

/// Collection URL derived from a model name: `BlogPost` -> `/blog_posts`.
pub fn collection_path(model: &str, pluralize_urls: bool) -> String {
    let snake = snake_case(model);
    if pluralize_urls {
        format!("/{}", pluralize(&snake))
    } else {
        format!("/{}", snake)
    }
}

fn split_last_word(word: &str) -> (&str, &str) {
    match word.rfind('_') {
        Some(index) => word.split_at(index + 1),
        None => ("", word),
    }
}

fn ends_with_vowel_y(word: &str) -> bool {
    let mut chars = word.chars().rev();
    chars.next();
    matches!(chars.next(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("comments"), "comment");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("blog_posts"), "blog_post");
        assert_eq!(singularize("class"), "class");
        assert_eq!(singularize("series"), "series");
        assert_eq!(singularize("author"), "author");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("comment"), "comments");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("blog_post"), "blog_posts");
    }

    #[test]
    fn test_inference() {
        assert_eq!(infer_target("comments"), "Comment");
        assert_eq!(infer_target("blog_posts"), "BlogPost");
        assert_eq!(infer_target("author"), "Author");
        assert_eq!(belongs_to_key("author"), "author_id");
        assert_eq!(has_many_key("BlogPost"), "blog_post_id");
        assert_eq!(collection_path("BlogPost", true), "/blog_posts");
        assert_eq!(collection_path("Person", true), "/people");
        assert_eq!(collection_path("Person", false), "/person");
    }
}
