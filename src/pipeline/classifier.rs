//! Strategic ship-type classification.
//!
//! The feed has no server-side type filter, so every vessel is classified
//! client-side from its static/voyage report against a small fixed
//! allow-list: military, law enforcement, search-and-rescue, and tanker
//! subtypes. Everything else is dropped before it can reach the published
//! snapshot.

/// Ship-type codes admitted to the confirmed set.
pub const STRATEGIC_SHIP_TYPES: &[u16] = &[35, 51, 55, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89];

/// Whether a reported ship-type code is strategically relevant.
pub fn is_strategic(code: u16) -> bool {
    matches!(code, 35 | 51 | 55 | 80..=89)
}

/// Human label for a ship-type code.
///
/// Covers the strategic set precisely and the remaining standard AIS ranges
/// coarsely — non-strategic labels only ever appear in logs.
pub fn ship_type_label(code: u16) -> &'static str {
    match code {
        35 => "Military operations",
        51 => "Search and rescue",
        55 => "Law enforcement",
        80 => "Tanker",
        81..=88 => "Tanker (hazardous)",
        89 => "Tanker (other)",
        30 => "Fishing",
        31 | 32 => "Towing",
        36 => "Sailing",
        37 => "Pleasure craft",
        40..=49 => "High-speed craft",
        50 => "Pilot vessel",
        52 => "Tug",
        53 => "Port tender",
        60..=69 => "Passenger",
        70..=79 => "Cargo",
        90..=99 => "Other",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_members_are_strategic() {
        for &code in STRATEGIC_SHIP_TYPES {
            assert!(is_strategic(code), "code {code} should be strategic");
        }
    }

    #[test]
    fn common_traffic_is_not_strategic() {
        for code in [0, 30, 36, 37, 52, 60, 70, 79, 90] {
            assert!(!is_strategic(code), "code {code} should not be strategic");
        }
    }

    #[test]
    fn tanker_range_is_inclusive() {
        assert!(is_strategic(80));
        assert!(is_strategic(89));
        assert!(!is_strategic(79));
        assert!(!is_strategic(90));
    }

    #[test]
    fn labels_cover_strategic_codes() {
        assert_eq!(ship_type_label(35), "Military operations");
        assert_eq!(ship_type_label(84), "Tanker (hazardous)");
        assert_eq!(ship_type_label(255), "Unknown");
    }
}
