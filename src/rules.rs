// ============================================================================
// rules.rs — gpulife
// CPU reference for the transition rule in life_step.wgsl. Used to check
// GPU generations cell-for-cell.
// ============================================================================

use crate::config::GridConfig;

/// Advance `cells` by one generation: toroidal Moore neighbourhood, B3/S23,
/// any non-zero word counts as alive and survivors keep their word.
pub fn step_reference(grid: GridConfig, cells: &[u32]) -> Vec<u32> {
    let w = grid.width as i64;
    let h = grid.height as i64;
    let alive = |x: i64, y: i64| -> u32 {
        let wx = x.rem_euclid(w);
        let wy = y.rem_euclid(h);
        cells[(wy * w + wx) as usize].min(1)
    };

    let mut next = vec![0u32; cells.len()];
    for y in 0..h {
        for x in 0..w {
            let mut neighbors = 0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx != 0 || dy != 0 {
                        neighbors += alive(x + dx, y + dy);
                    }
                }
            }
            let i = grid.index(x as u32, y as u32);
            next[i] = match neighbors {
                2 => cells[i],
                3 => 1,
                _ => 0,
            };
        }
    }
    next
}
