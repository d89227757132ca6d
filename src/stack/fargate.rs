//! Fargate task sizing.
//!
//! Fargate only accepts fixed (CPU, memory) pairs. The containers of a task
//! are summed and the first pair in the table that covers both totals wins.

use crate::error::TemplateError;
use crate::oam::Container;

const MIB: u64 = 1024 * 1024;

/// A valid Fargate task size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FargateTaskSize {
    /// Task CPU in millicores.
    pub cpu_millicores: u64,
    /// Task memory in MiB.
    pub memory_mib: u64,
}

impl FargateTaskSize {
    const fn new(cpu_millicores: u64, memory_mib: u64) -> Self {
        Self {
            cpu_millicores,
            memory_mib,
        }
    }

    /// Task CPU as CloudFormation expects it, e.g. `0.25 vcpu`.
    #[must_use]
    pub fn cpu_value(&self) -> String {
        format!(
            "{}.{:02} vcpu",
            self.cpu_millicores / 1000,
            (self.cpu_millicores % 1000) / 10
        )
    }

    /// Task memory in MiB, as text.
    #[must_use]
    pub fn memory_value(&self) -> String {
        self.memory_mib.to_string()
    }
}

/// Returns every valid task size in ascending table order.
///
/// Bands are ordered by CPU and each band's memory tiers ascend.
#[must_use]
pub fn valid_task_sizes() -> Vec<FargateTaskSize> {
    let mut sizes = vec![
        FargateTaskSize::new(250, 512),
        FargateTaskSize::new(250, 1024),
        FargateTaskSize::new(250, 2048),
    ];

    let bands: [(u64, std::ops::RangeInclusive<u64>); 4] =
        [(500, 1..=4), (1000, 1..=8), (2000, 4..=16), (4000, 8..=30)];
    for (cpu, gibibytes) in bands {
        sizes.extend(gibibytes.map(|gib| FargateTaskSize::new(cpu, gib * 1024)));
    }

    sizes
}

/// Sums container requirements as (CPU millicores, memory MiB rounded up).
#[must_use]
pub fn total_requirements(containers: &[Container]) -> (u64, u64) {
    let cpu = containers
        .iter()
        .map(|c| c.resources.cpu_millicores())
        .fold(0u64, u64::saturating_add);
    let memory_bytes = containers
        .iter()
        .map(|c| c.resources.memory_bytes())
        .fold(0u64, u64::saturating_add);
    (cpu, memory_bytes.div_ceil(MIB))
}

/// Finds the smallest task size that fits the given requirements.
///
/// # Errors
///
/// Returns an error carrying the requirements if no size is large enough.
pub fn size_for(cpu_millicores: u64, memory_mib: u64) -> Result<FargateTaskSize, TemplateError> {
    valid_task_sizes()
        .into_iter()
        .find(|size| cpu_millicores <= size.cpu_millicores && memory_mib <= size.memory_mib)
        .ok_or(TemplateError::NoFargateSize {
            cpu_millicores,
            memory_mib,
        })
}

/// Finds the smallest task size that fits all containers together.
///
/// # Errors
///
/// Returns an error if the containers need more than the largest size.
pub fn nearest_task_size(containers: &[Container]) -> Result<FargateTaskSize, TemplateError> {
    let (cpu, memory) = total_requirements(containers);
    size_for(cpu, memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oam::{Quantity, ResourceRequirement, Resources};

    fn container(cpu: &str, memory: &str) -> Container {
        Container {
            name: String::from("main"),
            image: String::from("busybox"),
            resources: Resources {
                cpu: Some(ResourceRequirement {
                    required: Quantity::parse(cpu).unwrap(),
                }),
                memory: Some(ResourceRequirement {
                    required: Quantity::parse(memory).unwrap(),
                }),
                ..Resources::default()
            },
            ..Container::default()
        }
    }

    fn index_of(size: FargateTaskSize) -> usize {
        valid_task_sizes().iter().position(|s| *s == size).unwrap()
    }

    #[test]
    fn test_table_is_ascending_within_bands() {
        let sizes = valid_task_sizes();
        assert_eq!(sizes.first(), Some(&FargateTaskSize::new(250, 512)));
        assert_eq!(sizes.last(), Some(&FargateTaskSize::new(4000, 30720)));
        for pair in sizes.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_smallest_fitting_tier_is_selected() {
        let size = nearest_task_size(&[container("0.6", "900Mi")]).unwrap();
        assert_eq!(size, FargateTaskSize::new(1000, 1024));
        assert_eq!(size.cpu_value(), "1.00 vcpu");
        assert_eq!(size.memory_value(), "1024");
    }

    #[test]
    fn test_requirements_are_summed_across_containers() {
        let containers = [container("250m", "256Mi"), container("250m", "256Mi")];
        assert_eq!(total_requirements(&containers), (500, 512));

        let size = nearest_task_size(&containers).unwrap();
        assert_eq!(size, FargateTaskSize::new(500, 1024));
        assert_eq!(size.cpu_value(), "0.50 vcpu");
    }

    #[test]
    fn test_memory_is_rounded_up_to_mib() {
        let containers = [container("0.25", "512M")];
        assert_eq!(total_requirements(&containers), (250, 489));

        let containers = [container("0.25", "513Mi")];
        assert_eq!(
            nearest_task_size(&containers).unwrap(),
            FargateTaskSize::new(250, 1024)
        );
    }

    #[test]
    fn test_unspecified_resources_use_smallest_tier() {
        let size = nearest_task_size(&[Container::default()]).unwrap();
        assert_eq!(size.cpu_value(), "0.25 vcpu");
        assert_eq!(size.memory_mib, 512);
    }

    #[test]
    fn test_oversized_requirements_report_values() {
        let err = nearest_task_size(&[container("8", "4Gi")]).unwrap_err();
        match err {
            TemplateError::NoFargateSize {
                cpu_millicores,
                memory_mib,
            } => {
                assert_eq!(cpu_millicores, 8000);
                assert_eq!(memory_mib, 4096);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolver_is_monotonic() {
        let cpus = [0, 100, 250, 300, 500, 700, 1000, 1500, 2000, 3000, 4000];
        let memories = [0, 256, 512, 600, 1024, 2048, 3000, 4096, 8192, 12000, 16384, 30720];

        for &cpu in &cpus {
            for window in memories.windows(2) {
                let lower = index_of(size_for(cpu, window[0]).unwrap());
                let higher = index_of(size_for(cpu, window[1]).unwrap());
                assert!(lower <= higher, "memory {window:?} at cpu {cpu}");
            }
        }
        for &memory in &memories {
            for window in cpus.windows(2) {
                let lower = index_of(size_for(window[0], memory).unwrap());
                let higher = index_of(size_for(window[1], memory).unwrap());
                assert!(lower <= higher, "cpu {window:?} at memory {memory}");
            }
        }
    }
}
