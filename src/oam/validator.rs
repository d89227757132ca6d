//! Inspection of schematic fields the generated stacks cannot honour.
//!
//! Such fields are accepted but reported so users know they have no effect
//! on the deployed service.

use super::spec::ComponentSchematic;

/// Operating system supported by Fargate tasks.
const SUPPORTED_OS: &str = "linux";

/// CPU architecture supported by Fargate tasks.
const SUPPORTED_ARCH: &str = "amd64";

/// Returns one warning per unsupported field set on the schematic.
#[must_use]
pub fn unsupported_fields(schematic: &ComponentSchematic) -> Vec<String> {
    let name = schematic.name();
    let mut warnings = Vec::new();

    if let Some(os) = schematic.spec.os_type.as_deref().filter(|os| *os != SUPPORTED_OS) {
        warnings.push(format!(
            "component {name}: osType {os} is not supported, tasks run on {SUPPORTED_OS}"
        ));
    }
    if let Some(arch) = schematic.spec.arch.as_deref().filter(|arch| *arch != SUPPORTED_ARCH) {
        warnings.push(format!(
            "component {name}: arch {arch} is not supported, tasks run on {SUPPORTED_ARCH}"
        ));
    }

    for container in &schematic.spec.containers {
        let at = format!("component {name}, container {}", container.name);
        let resources = &container.resources;

        if resources.gpu.is_some() {
            warnings.push(format!("{at}: gpu requirements are ignored"));
        }
        if !resources.extended.is_empty() {
            warnings.push(format!("{at}: extended resources are ignored"));
        }
        for volume in &resources.volumes {
            if volume.disk.is_some() {
                warnings.push(format!(
                    "{at}: disk requirement of volume {} is ignored",
                    volume.name
                ));
            }
            if volume.sharing_policy.is_some() {
                warnings.push(format!(
                    "{at}: sharingPolicy of volume {} is ignored",
                    volume.name
                ));
            }
        }
        if container.readiness_probe.is_some() {
            warnings.push(format!("{at}: readinessProbe is ignored"));
        }
        if !container.config.is_empty() {
            warnings.push(format!("{at}: config files are ignored"));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schematic(yaml: &str) -> ComponentSchematic {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_plain_schematic_has_no_warnings() {
        let s = schematic(
            r"
apiVersion: core.oam.dev/v1alpha1
kind: ComponentSchematic
metadata:
  name: worker
spec:
  workloadType: core.oam.dev/v1alpha1.Worker
  osType: linux
  arch: amd64
  containers:
    - name: main
      image: busybox
",
        );
        assert!(unsupported_fields(&s).is_empty());
    }

    #[test]
    fn test_unsupported_fields_are_reported() {
        let s = schematic(
            r"
apiVersion: core.oam.dev/v1alpha1
kind: ComponentSchematic
metadata:
  name: db
spec:
  workloadType: core.oam.dev/v1alpha1.Server
  osType: windows
  containers:
    - name: main
      image: postgres
      resources:
        volumes:
          - name: data
            mountPath: /var/lib/postgresql
            sharingPolicy: Exclusive
            disk:
              required: 10G
      readinessProbe:
        tcpSocket:
          port: 5432
      config:
        - path: /etc/app.conf
          value: x
",
        );
        let warnings = unsupported_fields(&s);
        assert_eq!(warnings.len(), 5);
        assert!(warnings[0].contains("osType windows"));
        assert!(warnings.iter().any(|w| w.contains("sharingPolicy of volume data")));
        assert!(warnings.iter().any(|w| w.contains("readinessProbe")));
    }
}
