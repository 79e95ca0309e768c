// ============================================================================
// stats.rs — gpulife
// Population diagnostics computed from a cell-state readback.
// ============================================================================

use crate::config::GridConfig;

/// Inclusive bounding box of live cells, in grid coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PopulationStats {
    pub live: u32,
    pub total: u32,
    pub density: f32,
    pub bounds: Option<Bounds>,
}

impl PopulationStats {
    pub fn from_cells(grid: GridConfig, cells: &[u32]) -> Self {
        let mut live = 0u32;
        let mut bounds: Option<Bounds> = None;

        for (i, &c) in cells.iter().enumerate() {
            if c == 0 {
                continue;
            }
            live += 1;
            let x = i as u32 % grid.width;
            let y = i as u32 / grid.width;
            bounds = Some(match bounds {
                None => Bounds {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
                Some(b) => Bounds {
                    min_x: b.min_x.min(x),
                    min_y: b.min_y.min(y),
                    max_x: b.max_x.max(x),
                    max_y: b.max_y.max(y),
                },
            });
        }

        let total = cells.len() as u32;
        Self {
            live,
            total,
            density: if total > 0 { live as f32 / total as f32 } else { 0.0 },
            bounds,
        }
    }

    /// Log at INFO level, with the change since `prev` when given.
    pub fn log(&self, generation: u64, prev: Option<&PopulationStats>) {
        let trend = match prev {
            Some(p) => format!(" | Δlive={:+}", self.live as i64 - p.live as i64),
            None => String::new(),
        };
        match self.bounds {
            Some(b) => log::info!(
                "Generation {}: live={}/{} ({:.1}%){} | bounds=({},{})..({},{})",
                generation,
                self.live,
                self.total,
                self.density * 100.0,
                trend,
                b.min_x,
                b.min_y,
                b.max_x,
                b.max_y,
            ),
            None => log::info!(
                "Generation {}: population extinct ({} cells){}",
                generation,
                self.total,
                trend
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_grid() {
        let stats = PopulationStats::from_cells(GridConfig::new(4, 4), &[0; 16]);
        assert_eq!(stats.live, 0);
        assert_eq!(stats.density, 0.0);
        assert_eq!(stats.bounds, None);
    }

    #[test]
    fn test_counts_and_bounds() {
        let grid = GridConfig::new(5, 4);
        let mut cells = vec![0u32; 20];
        cells[grid.index(1, 3)] = 1;
        cells[grid.index(4, 1)] = 1;
        cells[grid.index(2, 2)] = 7;
        let stats = PopulationStats::from_cells(grid, &cells);
        assert_eq!(stats.live, 3);
        assert_eq!(stats.total, 20);
        assert!((stats.density - 0.15).abs() < 1e-6);
        assert_eq!(
            stats.bounds,
            Some(Bounds {
                min_x: 1,
                min_y: 1,
                max_x: 4,
                max_y: 3
            })
        );
    }
}
