//! Client-side filtering of REST results.

use crate::models::{Container, Stack};
use crate::prefs::HiddenStacks;

/// Compose label naming the project (stack) a container belongs to.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Containers whose display name or image contains `query`, ignoring case.
/// An empty query matches everything.
pub fn search_containers<'a>(containers: &'a [Container], query: &str) -> Vec<&'a Container> {
    let query = query.trim().to_lowercase();
    containers
        .iter()
        .filter(|c| {
            query.is_empty()
                || c.display_name().to_lowercase().contains(&query)
                || c.image.to_lowercase().contains(&query)
        })
        .collect()
}

/// Containers belonging to `stack`: their compose project label contains
/// the stack name, ignoring case.
pub fn stack_containers<'a>(containers: &'a [Container], stack: &Stack) -> Vec<&'a Container> {
    let name = stack.name.to_lowercase();
    containers
        .iter()
        .filter(|c| {
            c.label(COMPOSE_PROJECT_LABEL)
                .is_some_and(|project| project.to_lowercase().contains(&name))
        })
        .collect()
}

/// Stacks that belong to environment `endpoint_id`.
pub fn stacks_in_endpoint(stacks: Vec<Stack>, endpoint_id: u64) -> Vec<Stack> {
    stacks
        .into_iter()
        .filter(|s| s.endpoint_id == endpoint_id)
        .collect()
}

/// Stacks the user has not hidden.
pub fn visible_stacks<'a>(stacks: &'a [Stack], hidden: &HiddenStacks) -> Vec<&'a Stack> {
    stacks.iter().filter(|s| !hidden.is_hidden(s.id)).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn container(name: &str, image: &str, project: Option<&str>) -> Container {
        Container {
            id: format!("{name}-0123456789abcdef"),
            names: vec![format!("/{name}")],
            image: image.into(),
            command: String::new(),
            created: 0,
            ports: Vec::new(),
            labels: project.map(|p| HashMap::from([(COMPOSE_PROJECT_LABEL.to_string(), p.to_string())])),
            state: "running".into(),
            status: "Up".into(),
        }
    }

    fn stack(id: u64, name: &str, endpoint_id: u64) -> Stack {
        Stack {
            id,
            name: name.into(),
            kind: 2,
            endpoint_id,
            swarm_id: String::new(),
            status: 1,
            creation_date: 0,
            created_by: String::new(),
            update_date: 0,
            updated_by: String::new(),
        }
    }

    fn names(found: &[&Container]) -> Vec<String> {
        found.iter().map(|c| c.display_name().to_string()).collect()
    }

    #[test]
    fn search_matches_name_or_image_case_insensitively() {
        let all = vec![
            container("web-1", "nginx:1.27", None),
            container("db", "postgres:16", None),
            container("cache", "redis:7", None),
        ];
        assert_eq!(names(&search_containers(&all, "WEB")), ["web-1"]);
        assert_eq!(names(&search_containers(&all, "postgres")), ["db"]);
        assert_eq!(search_containers(&all, "  ").len(), 3);
        assert!(search_containers(&all, "mysql").is_empty());
    }

    #[test]
    fn stack_membership_uses_compose_label() {
        let all = vec![
            container("grafana", "grafana/grafana", Some("Monitoring")),
            container("prom", "prom/prometheus", Some("monitoring-v2")),
            container("web", "nginx", Some("frontend")),
            container("loose", "alpine", None),
        ];
        let found = stack_containers(&all, &stack(1, "monitoring", 5));
        assert_eq!(names(&found), ["grafana", "prom"]);
    }

    #[test]
    fn endpoint_and_hidden_filters() {
        let stacks = vec![stack(1, "a", 5), stack(2, "b", 6), stack(3, "c", 5)];
        let in_five = stacks_in_endpoint(stacks, 5);
        assert_eq!(in_five.iter().map(|s| s.id).collect::<Vec<_>>(), [1, 3]);

        let dir = tempfile::tempdir().unwrap();
        let mut hidden = HiddenStacks::open(dir.path().join("hidden.json")).unwrap();
        hidden.hide(3).unwrap();
        let visible = visible_stacks(&in_five, &hidden);
        assert_eq!(visible.iter().map(|s| s.id).collect::<Vec<_>>(), [1]);
    }
}
