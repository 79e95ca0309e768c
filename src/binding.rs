// ============================================================================
// binding.rs — gpulife
// The two bind groupings of the ping-pong swap. Each grouping fixes which
// state buffer is read and which is written; generation parity picks the
// active one.
// ============================================================================

use crate::error::InitError;
use crate::gpu::{GpuContext, ScopeFault};
use crate::world::WorldBuffers;

/// Storage slot of a state buffer within a session. Slots never change role
/// on their own; roles come from the grouping that references them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    S0,
    S1,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::S0 => Slot::S1,
            Slot::S1 => Slot::S0,
        }
    }
}

/// Tag of a binding grouping. A reads S0 and writes S1; B the reverse.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Grouping {
    A,
    B,
}

impl Grouping {
    /// Grouping whose compute pass produces generation `generation + 1`.
    pub fn for_generation(generation: u64) -> Self {
        if generation % 2 == 0 {
            Grouping::A
        } else {
            Grouping::B
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Grouping::A => Grouping::B,
            Grouping::B => Grouping::A,
        }
    }

    pub fn input(self) -> Slot {
        match self {
            Grouping::A => Slot::S0,
            Grouping::B => Slot::S1,
        }
    }

    pub fn output(self) -> Slot {
        self.input().other()
    }

    fn label(self) -> &'static str {
        match self {
            Grouping::A => "cells_bg_a",
            Grouping::B => "cells_bg_b",
        }
    }
}

/// An immutable uniform + input + output association, bound at group 0.
pub struct BindingGrouping {
    pub tag: Grouping,
    pub bind_group: wgpu::BindGroup,
}

impl BindingGrouping {
    pub fn input(&self) -> Slot {
        self.tag.input()
    }

    pub fn output(&self) -> Slot {
        self.tag.output()
    }
}

pub struct BindingSet {
    a: BindingGrouping,
    b: BindingGrouping,
}

impl BindingSet {
    /// Wire both groupings against `layout`. Fails if either does not
    /// validate against the shared layout contract.
    pub fn new(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        world: &WorldBuffers,
    ) -> Result<Self, InitError> {
        let build = |tag: Grouping| {
            gpu.guarded(|device| BindingGrouping {
                tag,
                bind_group: device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(tag.label()),
                    layout,
                    entries: &[
                        bg_buffer(0, &world.uniforms),
                        bg_buffer(1, &world.state(tag.input()).buffer),
                        bg_buffer(2, &world.state(tag.output()).buffer),
                    ],
                }),
            })
            .map_err(|fault| {
                let msg = match fault {
                    ScopeFault::OutOfMemory(msg) | ScopeFault::Validation(msg) => msg,
                };
                InitError::ResourceAllocationFailure(format!(
                    "binding grouping {tag:?} rejected: {msg}"
                ))
            })
        };

        Ok(Self {
            a: build(Grouping::A)?,
            b: build(Grouping::B)?,
        })
    }

    pub fn get(&self, tag: Grouping) -> &BindingGrouping {
        match tag {
            Grouping::A => &self.a,
            Grouping::B => &self.b,
        }
    }
}

fn bg_buffer(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_roles_are_distinct() {
        for tag in [Grouping::A, Grouping::B] {
            assert_ne!(tag.input(), tag.output());
        }
        assert_eq!(Grouping::A.input(), Slot::S0);
        assert_eq!(Grouping::A.output(), Slot::S1);
        assert_eq!(Grouping::B.input(), Slot::S1);
        assert_eq!(Grouping::B.output(), Slot::S0);
    }

    #[test]
    fn test_parity_chains_output_into_next_input() {
        for generation in 0..64u64 {
            let now = Grouping::for_generation(generation);
            let next = Grouping::for_generation(generation + 1);
            assert_eq!(now.output(), next.input());
            assert_eq!(now.flipped(), next);
        }
        assert_eq!(Grouping::for_generation(0), Grouping::A);
        assert_eq!(Grouping::for_generation(u64::MAX), Grouping::B);
    }
}
