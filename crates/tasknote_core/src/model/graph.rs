//! Entity arena and parent/child wiring.
//!
//! # Responsibility
//! - Own every live task and task list of one note.
//! - Maintain both directions of the children/containers relation.
//!
//! # Invariants
//! - `task.list` and `list.tasks` always agree.
//! - `task.subtasks` and `list.super_tasks` always agree.
//! - Removing a list removes the tasks it owns.
//!
//! The relation is a directed graph, not a tree: a list may sit under
//! several super tasks, and malformed attributes can introduce cycles.

use crate::model::attributes::TaskAttributes;
use crate::model::task::{EntityRef, Task, TaskId, TaskList, TaskListId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: HashMap<TaskId, Task>,
    lists: HashMap<TaskListId, TaskList>,
    next_serial: u64,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn list(&self, id: TaskListId) -> Option<&TaskList> {
        self.lists.get(&id)
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    pub(crate) fn list_mut(&mut self, id: TaskListId) -> Option<&mut TaskList> {
        self.lists.get_mut(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn lists(&self) -> impl Iterator<Item = &TaskList> {
        self.lists.values()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty() && self.tasks.is_empty()
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Task(id) => self.tasks.contains_key(&id),
            EntityRef::TaskList(id) => self.lists.contains_key(&id),
        }
    }

    pub fn attributes(&self, entity: EntityRef) -> Option<&TaskAttributes> {
        match entity {
            EntityRef::Task(id) => self.tasks.get(&id).map(|task| &task.attributes),
            EntityRef::TaskList(id) => self.lists.get(&id).map(|list| &list.attributes),
        }
    }

    pub(crate) fn attributes_mut(&mut self, entity: EntityRef) -> Option<&mut TaskAttributes> {
        match entity {
            EntityRef::Task(id) => self.tasks.get_mut(&id).map(|task| &mut task.attributes),
            EntityRef::TaskList(id) => self.lists.get_mut(&id).map(|list| &mut list.attributes),
        }
    }

    /// Structural descendants: list -> tasks, task -> subtask lists.
    pub fn children(&self, entity: EntityRef) -> Vec<EntityRef> {
        match entity {
            EntityRef::TaskList(id) => self
                .lists
                .get(&id)
                .map(|list| list.tasks.iter().copied().map(EntityRef::Task).collect())
                .unwrap_or_default(),
            EntityRef::Task(id) => self
                .tasks
                .get(&id)
                .map(|task| {
                    task.subtasks
                        .iter()
                        .copied()
                        .map(EntityRef::TaskList)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Inverse of `children`: task -> its list, list -> its super tasks.
    pub fn containers(&self, entity: EntityRef) -> Vec<EntityRef> {
        match entity {
            EntityRef::Task(id) => self
                .tasks
                .get(&id)
                .map(|task| vec![EntityRef::TaskList(task.list)])
                .unwrap_or_default(),
            EntityRef::TaskList(id) => self
                .lists
                .get(&id)
                .map(|list| list.super_tasks.iter().copied().map(EntityRef::Task).collect())
                .unwrap_or_default(),
        }
    }

    pub(crate) fn next_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    pub(crate) fn insert_list(&mut self, list: TaskList) {
        self.lists.insert(list.id, list);
    }

    /// Inserts a task and appends it to its list. Returns `false` when the
    /// list does not exist; the task is not stored then.
    pub(crate) fn insert_task(&mut self, task: Task) -> bool {
        let Some(list) = self.lists.get_mut(&task.list) else {
            return false;
        };
        if !list.tasks.contains(&task.id) {
            list.tasks.push(task.id);
        }
        self.tasks.insert(task.id, task);
        true
    }

    /// Removes a task and every reference to it.
    pub(crate) fn remove_task(&mut self, id: TaskId) -> Option<Task> {
        let task = self.tasks.remove(&id)?;
        if let Some(list) = self.lists.get_mut(&task.list) {
            list.tasks.retain(|current| *current != id);
        }
        for sub in &task.subtasks {
            if let Some(list) = self.lists.get_mut(sub) {
                list.super_tasks.retain(|current| *current != id);
            }
        }
        Some(task)
    }

    /// Removes a list with the tasks it owns and every reference to it.
    pub(crate) fn remove_list(&mut self, id: TaskListId) -> Option<(TaskList, Vec<Task>)> {
        let owned: Vec<TaskId> = self.lists.get(&id)?.tasks.clone();
        let removed_tasks: Vec<Task> = owned
            .into_iter()
            .filter_map(|task| self.remove_task(task))
            .collect();
        let list = self.lists.remove(&id)?;
        for super_task in &list.super_tasks {
            if let Some(task) = self.tasks.get_mut(super_task) {
                task.subtasks.retain(|current| *current != id);
            }
        }
        Some((list, removed_tasks))
    }

    /// Moves a task to another list, appending it there.
    pub(crate) fn move_task(&mut self, id: TaskId, to: TaskListId) -> bool {
        if !self.lists.contains_key(&to) {
            return false;
        }
        let Some(task) = self.tasks.get_mut(&id) else {
            return false;
        };
        let from = task.list;
        task.list = to;
        if from != to {
            if let Some(list) = self.lists.get_mut(&from) {
                list.tasks.retain(|current| *current != id);
            }
        }
        if let Some(list) = self.lists.get_mut(&to) {
            if !list.tasks.contains(&id) {
                list.tasks.push(id);
            }
        }
        true
    }

    /// Nests `list` under `task`. Refuses unknown ids and a list nested under
    /// one of its own tasks.
    pub(crate) fn link_subtask_list(&mut self, task: TaskId, list: TaskListId) -> bool {
        let owner = match self.tasks.get(&task) {
            Some(current) => current.list,
            None => return false,
        };
        if owner == list || !self.lists.contains_key(&list) {
            return false;
        }
        if let Some(current) = self.tasks.get_mut(&task) {
            if !current.subtasks.contains(&list) {
                current.subtasks.push(list);
            }
        }
        if let Some(current) = self.lists.get_mut(&list) {
            if !current.super_tasks.contains(&task) {
                current.super_tasks.push(task);
            }
        }
        true
    }

    pub(crate) fn unlink_subtask_list(&mut self, task: TaskId, list: TaskListId) {
        if let Some(current) = self.tasks.get_mut(&task) {
            current.subtasks.retain(|id| *id != list);
        }
        if let Some(current) = self.lists.get_mut(&list) {
            current.super_tasks.retain(|id| *id != task);
        }
    }

    /// Reorders a list's tasks with the provided sort key.
    pub(crate) fn sort_tasks_by<K: Ord>(&mut self, list: TaskListId, mut key: impl FnMut(TaskId) -> K) {
        if let Some(current) = self.lists.get_mut(&list) {
            current.tasks.sort_by_key(|id| key(*id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TaskGraph;
    use crate::buffer::marker::{Gravity, MarkerTable};
    use crate::buffer::tag::TagId;
    use crate::model::attributes::TaskAttributes;
    use crate::model::task::{EntityRef, Task, TaskId, TaskList, TaskListId};
    use uuid::Uuid;

    fn list(graph: &mut TaskGraph, markers: &mut MarkerTable) -> TaskListId {
        let id = TaskListId::from_tag(TagId::new());
        let serial = graph.next_serial();
        graph.insert_list(TaskList {
            id,
            serial,
            note: Uuid::nil(),
            start: markers.create(0, Gravity::Right),
            end_lock: None,
            tasks: Vec::new(),
            super_tasks: Vec::new(),
            attributes: TaskAttributes::default(),
        });
        id
    }

    fn task(graph: &mut TaskGraph, markers: &mut MarkerTable, list: TaskListId) -> TaskId {
        let id = TaskId::from_tag(TagId::new());
        let serial = graph.next_serial();
        assert!(graph.insert_task(Task {
            id,
            serial,
            start: markers.create(0, Gravity::Right),
            list,
            subtasks: Vec::new(),
            attributes: TaskAttributes::default(),
        }));
        id
    }

    #[test]
    fn children_and_containers_are_inverse() {
        let mut markers = MarkerTable::new();
        let mut graph = TaskGraph::new();
        let parent = list(&mut graph, &mut markers);
        let owner = task(&mut graph, &mut markers, parent);
        let nested = list(&mut graph, &mut markers);
        assert!(graph.link_subtask_list(owner, nested));

        assert_eq!(
            graph.children(EntityRef::TaskList(parent)),
            vec![EntityRef::Task(owner)]
        );
        assert_eq!(
            graph.children(EntityRef::Task(owner)),
            vec![EntityRef::TaskList(nested)]
        );
        assert_eq!(
            graph.containers(EntityRef::TaskList(nested)),
            vec![EntityRef::Task(owner)]
        );
        assert_eq!(
            graph.containers(EntityRef::Task(owner)),
            vec![EntityRef::TaskList(parent)]
        );
    }

    #[test]
    fn list_cannot_nest_under_its_own_task() {
        let mut markers = MarkerTable::new();
        let mut graph = TaskGraph::new();
        let parent = list(&mut graph, &mut markers);
        let owner = task(&mut graph, &mut markers, parent);
        assert!(!graph.link_subtask_list(owner, parent));
    }

    #[test]
    fn removing_a_list_removes_owned_tasks_and_links() {
        let mut markers = MarkerTable::new();
        let mut graph = TaskGraph::new();
        let parent = list(&mut graph, &mut markers);
        let owner = task(&mut graph, &mut markers, parent);
        let nested = list(&mut graph, &mut markers);
        let child = task(&mut graph, &mut markers, nested);
        graph.link_subtask_list(owner, nested);

        let (_, removed) = graph.remove_list(nested).expect("list exists");
        assert_eq!(removed.len(), 1);
        assert!(graph.task(child).is_none());
        assert!(graph.task(owner).map(|t| t.subtasks.is_empty()).unwrap_or(false));
    }

    #[test]
    fn move_task_updates_both_lists() {
        let mut markers = MarkerTable::new();
        let mut graph = TaskGraph::new();
        let first = list(&mut graph, &mut markers);
        let second = list(&mut graph, &mut markers);
        let moved = task(&mut graph, &mut markers, second);

        assert!(graph.move_task(moved, first));
        assert_eq!(graph.list(first).map(|l| l.tasks.len()), Some(1));
        assert_eq!(graph.list(second).map(|l| l.tasks.len()), Some(0));
        assert_eq!(graph.task(moved).map(|t| t.list), Some(first));
    }
}
