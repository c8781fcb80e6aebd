use gauge_protocol::{Visibility, VisualElement, VisualState};

/// Ten 10%-wide tiers; bucket `b` in 1..=10 selects `TIERS[b - 1]`.
const TIERS: [VisualElement; 10] = [
    VisualElement::Tier(1),
    VisualElement::Tier(2),
    VisualElement::Tier(3),
    VisualElement::Tier(4),
    VisualElement::Tier(5),
    VisualElement::Tier(6),
    VisualElement::Tier(7),
    VisualElement::Tier(8),
    VisualElement::Tier(9),
    VisualElement::Tier(10),
];

/// Map a 0-100 level to exactly one visible element plus the charging overlay.
pub fn render(level: i32, is_charging: bool) -> VisualState {
    let level = level.clamp(0, 100);
    let bucket = (level / 10) as usize;

    let element = match bucket {
        0 => VisualElement::Base,
        b => TIERS[b - 1],
    };

    let charging_overlay = if is_charging {
        Visibility::Visible
    } else {
        Visibility::Gone
    };

    VisualState {
        element,
        charging_overlay,
        label: format!("{}%", level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_levels_show_base() {
        for level in [0, 9] {
            let state = render(level, false);
            assert!(state.is_base());
            assert_eq!(state.tier(), None);
            assert_eq!(state.charging_overlay, Visibility::Gone);
        }
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(render(10, false).tier(), Some(1));
        assert_eq!(render(19, false).tier(), Some(1));
        assert_eq!(render(20, false).tier(), Some(2));
        assert_eq!(render(99, false).tier(), Some(9));
        assert_eq!(render(100, false).tier(), Some(10));
    }

    #[test]
    fn test_charging_shows_overlay() {
        let state = render(55, true);
        assert_eq!(state.tier(), Some(5));
        assert_eq!(state.charging_overlay, Visibility::Visible);
        assert_eq!(state.label, "55%");
    }

    #[test]
    fn test_every_level_has_one_element() {
        for level in 0..=100 {
            let state = render(level, level % 2 == 0);
            let expected = if level < 10 {
                VisualElement::Base
            } else {
                VisualElement::Tier((level / 10) as u8)
            };
            assert_eq!(state.element, expected, "level={}", level);
            assert_eq!(state.label, format!("{}%", level));
        }
    }

    #[test]
    fn test_out_of_range_level_is_clamped() {
        assert_eq!(render(140, false).tier(), Some(10));
        assert!(render(-3, false).is_base());
    }
}
