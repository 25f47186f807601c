//! Category cap rule.
//!
//! A participant may hold at most `cap` items of one category. An item's
//! category is the values of a configured list of attributes joined with
//! `/` (for example `east/north` for `[conference, division]`).
//!
//! When every available item would break the cap, the rule is overridden
//! and any available item becomes legal, so no participant can be left
//! without a move. The override is decided on the available set after the
//! cap filter, never on the raw pool.

use std::collections::BTreeMap;

use draftday_types::{Item, ItemId};

/// Placeholder used when an item lacks one of the category attributes.
const MISSING_ATTRIBUTE: &str = "-";

/// Category extraction plus cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    fields: Vec<String>,
    cap: u32,
}

impl CategoryRule {
    /// A rule grouping items by `fields` and allowing `cap` per group.
    pub const fn new(fields: Vec<String>, cap: u32) -> Self {
        Self { fields, cap }
    }

    /// Maximum items per category.
    pub const fn cap(&self) -> u32 {
        self.cap
    }

    /// Attribute names forming the category.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The category `item` belongs to.
    pub fn category_of(&self, item: &Item) -> String {
        self.fields
            .iter()
            .map(|field| item.attribute(field).unwrap_or(MISSING_ATTRIBUTE))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Count of held items per category.
    pub fn tally<'i>(&self, held: impl IntoIterator<Item = &'i Item>) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for item in held {
            let count: &mut u32 = counts.entry(self.category_of(item)).or_default();
            *count = count.saturating_add(1);
        }
        counts
    }
}

/// The legal choices for one participant at one moment.
#[derive(Debug, Clone)]
pub struct Eligibility<'a> {
    candidates: Vec<&'a Item>,
    overridden: bool,
}

impl<'a> Eligibility<'a> {
    /// Evaluate `available` against what the participant already `held`.
    pub fn evaluate(rule: &CategoryRule, held: &[&Item], available: &[&'a Item]) -> Self {
        let counts = rule.tally(held.iter().copied());
        let under_cap: Vec<&'a Item> = available
            .iter()
            .copied()
            .filter(|item| {
                counts
                    .get(&rule.category_of(item))
                    .is_none_or(|&count| count < rule.cap())
            })
            .collect();

        if under_cap.is_empty() && !available.is_empty() {
            return Self {
                candidates: available.to_vec(),
                overridden: true,
            };
        }
        Self {
            candidates: under_cap,
            overridden: false,
        }
    }

    /// Items the participant may legally pick.
    pub fn candidates(&self) -> &[&'a Item] {
        &self.candidates
    }

    /// Whether the cap was lifted because nothing under it remained.
    pub const fn is_overridden(&self) -> bool {
        self.overridden
    }

    /// Whether no item at all is left to pick.
    pub fn is_exhausted(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Whether `item_id` is a legal pick.
    pub fn permits(&self, item_id: ItemId) -> bool {
        self.candidates.iter().any(|item| item.id == item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn division_rule(cap: u32) -> CategoryRule {
        CategoryRule::new(vec!["conference".to_owned(), "division".to_owned()], cap)
    }

    #[test]
    fn category_joins_configured_fields() {
        let rule = division_rule(1);
        let item = Item::new("Hawks", &[("conference", "east"), ("division", "north")]);
        assert_eq!(rule.category_of(&item), "east/north");

        let partial = Item::new("Owls", &[("conference", "west")]);
        assert_eq!(rule.category_of(&partial), "west/-");
    }

    #[test]
    fn capped_categories_are_filtered_out() {
        let rule = division_rule(1);
        let held = Item::new("Hawks", &[("conference", "east"), ("division", "north")]);
        let same = Item::new("Crows", &[("conference", "east"), ("division", "north")]);
        let other = Item::new("Wolves", &[("conference", "east"), ("division", "south")]);

        let eligibility = Eligibility::evaluate(&rule, &[&held], &[&same, &other]);
        assert!(!eligibility.is_overridden());
        assert!(!eligibility.permits(same.id));
        assert!(eligibility.permits(other.id));
    }

    #[test]
    fn override_fires_only_when_no_alternative_is_left() {
        let rule = division_rule(1);
        let held = Item::new("Hawks", &[("conference", "east"), ("division", "north")]);
        let same = Item::new("Crows", &[("conference", "east"), ("division", "north")]);

        let eligibility = Eligibility::evaluate(&rule, &[&held], &[&same]);
        assert!(eligibility.is_overridden());
        assert!(eligibility.permits(same.id));
    }

    #[test]
    fn larger_caps_allow_repeats() {
        let rule = CategoryRule::new(vec!["conference".to_owned()], 3);
        let a = Item::new("A", &[("conference", "east")]);
        let b = Item::new("B", &[("conference", "east")]);
        let c = Item::new("C", &[("conference", "east")]);
        let d = Item::new("D", &[("conference", "east")]);
        let e = Item::new("E", &[("conference", "west")]);

        let two = Eligibility::evaluate(&rule, &[&a, &b], &[&c, &e]);
        assert!(two.permits(c.id));

        let three = Eligibility::evaluate(&rule, &[&a, &b, &c], &[&d, &e]);
        assert!(!three.permits(d.id));
        assert!(three.permits(e.id));
    }

    #[test]
    fn empty_pool_is_exhausted() {
        let rule = division_rule(1);
        let eligibility = Eligibility::evaluate(&rule, &[], &[]);
        assert!(eligibility.is_exhausted());
        assert!(!eligibility.is_overridden());
    }
}
