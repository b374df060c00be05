/// Canonical search radii in miles, narrowest first.
pub const CANONICAL_RADII: [u32; 5] = [5, 10, 25, 50, 100];

/// Expands a location search into an ordered sequence of radii.
pub struct SearchLadder;

impl SearchLadder {
    /// Ascending canonical radii not wider than `max_radius`.
    ///
    /// Never empty: when `max_radius` is below the narrowest canonical value
    /// the ladder is `[max_radius]` alone.
    pub fn radii(max_radius: u32) -> Vec<u32> {
        let ladder: Vec<u32> = CANONICAL_RADII
            .iter()
            .copied()
            .filter(|&r| r <= max_radius)
            .collect();
        if ladder.is_empty() {
            vec![max_radius]
        } else {
            ladder
        }
    }

    /// Radii to try for a candidate: the full ladder, or just `max_radius`
    /// when laddering is switched off.
    pub fn for_candidate(max_radius: u32, ladder_enabled: bool) -> Vec<u32> {
        if ladder_enabled {
            Self::radii(max_radius)
        } else {
            vec![max_radius]
        }
    }
}
