//! Default item pool.
//!
//! 32 items split across two conferences of four divisions each, four items
//! per division. Seeded into the durable store on first start when the
//! store holds no items.

use draftday_types::Item;

/// Attribute naming an item's conference.
pub const CONFERENCE: &str = "conference";

/// Attribute naming an item's division.
pub const DIVISION: &str = "division";

/// `(conference, division, [names])` for every division in the default pool.
const DIVISIONS: [(&str, &str, [&str; 4]); 8] = [
    ("Harbor", "North", ["Anchors", "Beacons", "Cutters", "Dredgers"]),
    ("Harbor", "South", ["Egrets", "Ferrymen", "Gulls", "Herons"]),
    ("Harbor", "East", ["Islanders", "Jetties", "Krakens", "Lanterns"]),
    ("Harbor", "West", ["Mariners", "Narwhals", "Oarsmen", "Pelicans"]),
    ("Summit", "North", ["Quarriers", "Ridgebacks", "Sherpas", "Timberwolves"]),
    ("Summit", "South", ["Uplanders", "Vultures", "Wranglers", "Yaks"]),
    ("Summit", "East", ["Avalanche", "Bighorns", "Condors", "Drifters"]),
    ("Summit", "West", ["Eagles", "Foxes", "Glaciers", "Highlanders"]),
];

/// Build the default 32-item pool with fresh identifiers.
pub fn default_pool() -> Vec<Item> {
    DIVISIONS
        .iter()
        .flat_map(|(conference, division, names)| {
            names
                .iter()
                .map(move |name| Item::new(name, &[(CONFERENCE, conference), (DIVISION, division)]))
        })
        .collect()
}
