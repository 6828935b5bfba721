use crate::domain::person::Role;
use crate::services::api_client::TaskPayload;

/// A field (or assignment slot) a role may edit. Gates UI affordances;
/// the server enforces the same table independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditField {
    PlanningDescription,
    PlanningDueDate,
    PlanningStatus,
    ProjectStatus,
    ProjectDueDate,
    ManagerAssignment,
    PlanningFiles,
    Priority,
    EmployeeAssignment,
    ProjectFiles,
    ProjectComment,
}

/// Owner if the identity matches the board owner's email, else
/// Manager/Employee by the respective assignment, else Viewer.
pub fn resolve_role(task: &TaskPayload, identity: &str) -> Role {
    if task.owner.as_ref().is_some_and(|p| p.email == identity) {
        return Role::Owner;
    }
    if task.manager.as_ref().is_some_and(|p| p.email == identity) {
        return Role::Manager;
    }
    if task.employee.as_ref().is_some_and(|p| p.email == identity) {
        return Role::Employee;
    }
    Role::Viewer
}

pub fn editable_fields(role: Role) -> &'static [EditField] {
    use EditField::*;

    match role {
        Role::Owner => &[
            PlanningDescription,
            PlanningDueDate,
            PlanningStatus,
            ProjectStatus,
            ProjectDueDate,
            ManagerAssignment,
        ],
        Role::Manager => &[PlanningFiles, Priority, EmployeeAssignment],
        Role::Employee => &[ProjectFiles, ProjectComment],
        Role::Viewer => &[],
    }
}

pub fn can_edit(role: Role, field: EditField) -> bool {
    editable_fields(role).contains(&field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::api_client::PersonPayload;

    fn task(owner: &str, manager: Option<&str>, employee: Option<&str>) -> TaskPayload {
        TaskPayload {
            owner: Some(PersonPayload {
                email: owner.to_string(),
            }),
            manager: manager.map(|e| PersonPayload {
                email: e.to_string(),
            }),
            employee: employee.map(|e| PersonPayload {
                email: e.to_string(),
            }),
            ..TaskPayload::default()
        }
    }

    #[test]
    fn test_resolve_role() {
        let payload = task("owner@x.co", Some("mgr@x.co"), Some("emp@x.co"));

        assert_eq!(resolve_role(&payload, "owner@x.co"), Role::Owner);
        assert_eq!(resolve_role(&payload, "mgr@x.co"), Role::Manager);
        assert_eq!(resolve_role(&payload, "emp@x.co"), Role::Employee);
        assert_eq!(resolve_role(&payload, "stranger@x.co"), Role::Viewer);
    }

    #[test]
    fn test_owner_wins_over_other_assignments() {
        // The same email in several slots resolves to the strongest role.
        let payload = task("me@x.co", Some("me@x.co"), None);
        assert_eq!(resolve_role(&payload, "me@x.co"), Role::Owner);
    }

    #[test]
    fn test_editable_field_table() {
        assert!(can_edit(Role::Owner, EditField::PlanningStatus));
        assert!(can_edit(Role::Owner, EditField::ManagerAssignment));
        assert!(!can_edit(Role::Owner, EditField::Priority));

        assert!(can_edit(Role::Manager, EditField::Priority));
        assert!(can_edit(Role::Manager, EditField::PlanningFiles));
        assert!(!can_edit(Role::Manager, EditField::ProjectStatus));

        assert!(can_edit(Role::Employee, EditField::ProjectComment));
        assert!(!can_edit(Role::Employee, EditField::PlanningDescription));

        assert!(editable_fields(Role::Viewer).is_empty());
    }
}
