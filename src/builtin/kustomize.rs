//! Common kustomize configuration

use crate::machinery::IfExistsAction;
use crate::plugin::{Phase, Plugin, ProjectVersion, ScaffoldContext, Version};

pub const NAME: &str = "kustomize.common.scaffold.dev";

/// Path of the cert-manager kustomize configuration, relative to the project root
pub const KUSTOMIZE_CONFIG_PATH: &str = "config/certmanager/kustomizeconfig.yaml";

const KUSTOMIZE_CONFIG: &str = "\
# This configuration is for teaching kustomize how to update name ref substitution
nameReference:
- kind: Issuer
  group: cert-manager.io
  fieldSpecs:
  - kind: Certificate
    group: cert-manager.io
    path: spec/issuerRef/name
";

const SUPPORTED: &[ProjectVersion] = &[ProjectVersion::stable(3)];

/// Scaffolds the kustomize configuration shared by webhook projects
///
/// The file is skipped when it already exists, so running `create webhook`
/// after `init` leaves a hand-edited copy alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct KustomizeCommonPlugin;

impl Plugin for KustomizeCommonPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> Version {
        Version::stable(1)
    }

    fn supported_project_versions(&self) -> &[ProjectVersion] {
        SUPPORTED
    }

    fn supports(&self, phase: Phase) -> bool {
        matches!(phase, Phase::Init | Phase::CreateWebhook)
    }

    fn scaffold(&self, phase: Phase, ctx: &mut ScaffoldContext<'_>) -> anyhow::Result<()> {
        let outcome = ctx.write(KUSTOMIZE_CONFIG_PATH, KUSTOMIZE_CONFIG, IfExistsAction::Skip)?;
        tracing::debug!(phase = %phase, path = %outcome.path.display(), status = ?outcome.status, "kustomize config");
        Ok(())
    }
}
