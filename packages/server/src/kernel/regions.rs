//! Static registry of rental-shop websites per supported city.
//!
//! The list order matters: it fixes the stagger index each live scrape
//! task gets, so burst load on the agent fleet stays predictable.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref CITY_SITES: HashMap<&'static str, Vec<&'static str>> = {
        let mut m = HashMap::new();
        m.insert(
            "hcmc",
            vec![
                "https://www.tigitmotorbikes.com/prices",
                "https://wheelie-saigon.com/scooter-motorcycle-rental-hcmc-daily-weekly-or-monthly/",
                "https://saigonmotorcycles.com/rentals/",
                "https://stylemotorbikes.com",
                "https://theextramile.co/city-rental-prices/",
            ],
        );
        m.insert(
            "hanoi",
            vec![
                "https://motorbikerentalinhanoi.com/",
                "https://offroadvietnam.com",
                "https://rentbikehanoi.com",
                "https://book2wheel.com",
                "https://motorvina.com",
            ],
        );
        m.insert(
            "danang",
            vec![
                "https://motorbikerentaldanang.com/",
                "https://danangmotorbikesrental.com",
                "https://danangbike.com",
                "https://motorbikerentalhoian.com",
                "https://hoianbikerental.com/pricing/",
                "https://tuanmotorbike.com",
            ],
        );
        m.insert(
            "nhatrang",
            vec![
                "https://moto4free.com/",
                "https://motorbikemuine.com/",
            ],
        );
        m
    };
}

/// Look up the site list for a city (already lowercased by the caller).
///
/// Returns `None` for unknown cities; a supported city never maps to an
/// empty list.
pub fn sites_for_city(city: &str) -> Option<&'static [&'static str]> {
    CITY_SITES
        .get(city)
        .map(|sites| sites.as_slice())
        .filter(|sites| !sites.is_empty())
}

/// All supported city keys.
pub fn supported_cities() -> Vec<&'static str> {
    CITY_SITES.keys().copied().collect()
}
