//! Duplicate-free, cycle-safe traversal of an object graph.
//!
//! The walk is a pre-order depth-first search over the fields a graph reports
//! for each object. Every object is offered to an [`ObjectFilter`] before it is
//! visited; rejected objects are neither marked visited nor expanded. An
//! object's fields are expanded lazily, on the step after it is emitted, so a
//! caller may change the object (e.g. load its stored state) between steps and
//! the walk continues into whatever the object holds by then.

use std::collections::HashSet;
use std::hash::Hash;

use super::schema::FieldSchema;

/// The value a field holds, as far as traversal is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<Id> {
    /// Null.
    Empty,
    /// A plain value with no graph identity.
    Scalar,
    Object(Id),
    Sequence(Vec<Id>),
}

/// A graph the recursor can walk.
pub trait ObjectGraph {
    type Id: Copy + Eq + Hash;

    /// Every field of `object` in declaration order, with its classification.
    ///
    /// Unknown objects report no fields.
    fn fields(&self, object: Self::Id) -> Vec<(FieldSchema, FieldValue<Self::Id>)>;
}

/// Decides whether the walk enters an object.
///
/// `field` is the field the object was reached through (`None` for the walk
/// root) and `referrer` the object that holds that field.
pub trait ObjectFilter<G: ObjectGraph + ?Sized> {
    fn admit(
        &mut self,
        graph: &G,
        field: Option<&FieldSchema>,
        object: G::Id,
        referrer: Option<G::Id>,
    ) -> bool;
}

impl<G, F> ObjectFilter<G> for F
where
    G: ObjectGraph + ?Sized,
    F: FnMut(&G, Option<&FieldSchema>, G::Id, Option<G::Id>) -> bool,
{
    fn admit(
        &mut self,
        graph: &G,
        field: Option<&FieldSchema>,
        object: G::Id,
        referrer: Option<G::Id>,
    ) -> bool {
        self(graph, field, object, referrer)
    }
}

#[derive(Debug, Clone)]
struct Pending<Id> {
    field: Option<FieldSchema>,
    object: Id,
    referrer: Option<Id>,
}

/// Step-wise walker; see the module docs.
#[derive(Debug)]
pub struct Recursor<Id> {
    stack: Vec<Pending<Id>>,
    visited: HashSet<Id>,
    order: Vec<Id>,
    /// Last emitted object and its referrer, expanded on the next step.
    expand: Option<(Id, Option<Id>)>,
}

impl<Id: Copy + Eq + Hash> Recursor<Id> {
    /// Starts a walk at `root`. Fields pointing back at `excluded_parent` are
    /// not followed out of the root.
    pub fn new(root: Id, excluded_parent: Option<Id>) -> Self {
        Self {
            stack: vec![Pending {
                field: None,
                object: root,
                referrer: excluded_parent,
            }],
            visited: HashSet::new(),
            order: Vec::new(),
            expand: None,
        }
    }

    /// Emits the next admitted object, or `None` when the walk is complete.
    pub fn next<G, F>(&mut self, graph: &G, filter: &mut F) -> Option<Id>
    where
        G: ObjectGraph<Id = Id> + ?Sized,
        F: ObjectFilter<G> + ?Sized,
    {
        if let Some((object, referrer)) = self.expand.take() {
            self.push_fields(graph, object, referrer);
        }

        while let Some(pending) = self.stack.pop() {
            if self.visited.contains(&pending.object) {
                continue;
            }
            if !filter.admit(graph, pending.field.as_ref(), pending.object, pending.referrer) {
                continue;
            }
            self.visited.insert(pending.object);
            self.order.push(pending.object);
            self.expand = Some((pending.object, pending.referrer));
            return Some(pending.object);
        }
        None
    }

    pub fn is_visited(&self, object: Id) -> bool {
        self.visited.contains(&object)
    }

    /// Objects emitted so far, in first-visit order.
    pub fn visited(&self) -> &[Id] {
        &self.order
    }

    pub fn into_visited(self) -> Vec<Id> {
        self.order
    }

    fn push_fields<G>(&mut self, graph: &G, object: Id, referrer: Option<Id>)
    where
        G: ObjectGraph<Id = Id> + ?Sized,
    {
        let mut found = Vec::new();
        for (field, value) in graph.fields(object) {
            match value {
                FieldValue::Empty | FieldValue::Scalar => {}
                FieldValue::Object(target) => found.push((field, target)),
                FieldValue::Sequence(targets) => {
                    found.extend(targets.into_iter().map(|target| (field, target)))
                }
            }
        }

        // Reversed so the first field's first value is popped first.
        for (field, target) in found.into_iter().rev() {
            if Some(target) == referrer || self.visited.contains(&target) {
                continue;
            }
            self.stack.push(Pending {
                field: Some(field),
                object: target,
                referrer: Some(object),
            });
        }
    }
}

/// Walks the whole graph reachable from `root` and returns the visited
/// objects in pre-order.
pub fn recurse_object_graph<G, F>(
    graph: &G,
    root: G::Id,
    excluded_parent: Option<G::Id>,
    filter: &mut F,
) -> Vec<G::Id>
where
    G: ObjectGraph + ?Sized,
    F: ObjectFilter<G> + ?Sized,
{
    let mut recursor = Recursor::new(root, excluded_parent);
    while recursor.next(graph, filter).is_some() {}
    recursor.into_visited()
}

/// Applies `op` to each object in order, stopping at the first error.
///
/// Returns how many objects `op` reported as handled.
pub fn recursively_do<Id, E, I, F>(objects: I, mut op: F) -> Result<usize, E>
where
    I: IntoIterator<Item = Id>,
    F: FnMut(Id) -> Result<bool, E>,
{
    let mut handled = 0;
    for object in objects {
        if op(object)? {
            handled += 1;
        }
    }
    Ok(handled)
}
