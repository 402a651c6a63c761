// modlink-core/src/link/plan.rs
use std::path::Path;

use modlink_aio::{create_dir_all, write_file};
use modlink_common::error::Result;
use tracing::debug;

use super::{LinkPlan, Linker};

pub const PLAN_FILE_NAME: &str = "link-plan.json";

/// Records the plan as `link-plan.json` instead of running a linker. Jars
/// generated in the build's staging directory are recorded relative to it,
/// so rebuilding the same input writes the same file.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanLinker;

impl Linker for PlanLinker {
    fn name(&self) -> &str {
        "plan"
    }

    fn link(&self, plan: &LinkPlan, image_dir: &Path) -> Result<()> {
        create_dir_all(image_dir)?;
        let mut recorded = plan.clone();
        if let Some(staging) = image_dir.parent() {
            for path in &mut recorded.module_path {
                if let Ok(relative) = path.strip_prefix(staging) {
                    *path = relative.to_path_buf();
                }
            }
        }
        let mut json = serde_json::to_string_pretty(&recorded)?;
        json.push('\n');
        let path = image_dir.join(PLAN_FILE_NAME);
        debug!("Writing link plan to {}", path.display());
        write_file(&path, json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::link::LaunchTarget;

    #[test]
    fn writes_plan_json() {
        let dir = TempDir::new().unwrap();
        let plan = LinkPlan {
            module_path: vec![PathBuf::from("/libs/a.jar")],
            root_modules: vec!["a".into(), "b".into()],
            launchers: vec![LaunchTarget {
                name: "app".into(),
                module: "a".into(),
                main_class: "a.Main".into(),
            }],
            options: vec![],
            output: PathBuf::from("/out/image"),
            sources: Default::default(),
        };
        let image = dir.path().join("image");
        PlanLinker.link(&plan, &image).unwrap();

        let text = std::fs::read_to_string(image.join(PLAN_FILE_NAME)).unwrap();
        let read: LinkPlan = serde_json::from_str(&text).unwrap();
        assert_eq!(read, plan);
    }

    #[test]
    fn generated_jars_are_recorded_relative_to_the_staging_dir() {
        let dir = TempDir::new().unwrap();
        let plan = LinkPlan {
            module_path: vec![
                PathBuf::from("/libs/a.jar"),
                dir.path().join("modules").join("a.merged.module.jar"),
            ],
            root_modules: vec!["a".into(), "a.merged.module".into()],
            launchers: vec![],
            options: vec![],
            output: PathBuf::from("/out/image"),
            sources: Default::default(),
        };
        let image = dir.path().join("image");
        PlanLinker.link(&plan, &image).unwrap();

        let text = std::fs::read_to_string(image.join(PLAN_FILE_NAME)).unwrap();
        let read: LinkPlan = serde_json::from_str(&text).unwrap();
        assert_eq!(
            read.module_path,
            [
                PathBuf::from("/libs/a.jar"),
                PathBuf::from("modules").join("a.merged.module.jar"),
            ]
        );
    }
}
