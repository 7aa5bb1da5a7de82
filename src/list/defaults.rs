//! Stock categories every fresh list starts with

use super::Category;

/// The categories a list holds before any user data is loaded
pub fn initial_categories() -> Vec<Category> {
    [
        (1, "Produce"),
        (2, "Meat & Seafood"),
        (3, "Dairy & Eggs"),
        (4, "Bakery"),
        (5, "Pantry"),
        (6, "Frozen Foods"),
        (7, "Beverages"),
        (8, "Snacks"),
        (9, "Personal Care"),
        (10, "Household"),
        (11, "Pet Supplies"),
        (12, "Deli"),
        (13, "Condiments & Sauces"),
        (14, "Canned Goods"),
        (15, "Pasta & Grains"),
    ]
    .into_iter()
    .map(|(id, name)| Category {
        id,
        name: name.to_string(),
    })
    .collect()
}
