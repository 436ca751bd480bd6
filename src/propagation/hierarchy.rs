//! Hierarchy tree of a multiple-star system
//!
//! Leaves are bodies, internal nodes are orbits. Each orbit couples a primary
//! and a secondary child, either of which may be a body or a nested orbit
//! whose barycenter acts as the two-body partner.

use serde::{Deserialize, Serialize};

use super::error::DynamicsError;

/// Child of an orbit node
///
/// Serialized as `{"body": i}` or `{"orbit": k}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Body(usize),
    Orbit(usize),
}

/// Which child slot of an orbit a component occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Primary,
    Secondary,
}

/// One two-body relationship in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrbitNode {
    pub primary: Component,
    pub secondary: Component,
}

impl OrbitNode {
    pub fn new(primary: Component, secondary: Component) -> Self {
        Self { primary, secondary }
    }

    pub fn child(&self, side: Side) -> Component {
        match side {
            Side::Primary => self.primary,
            Side::Secondary => self.secondary,
        }
    }
}

/// Validated hierarchy of N bodies and N-1 orbits
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    n_bodies: usize,
    orbits: Vec<OrbitNode>,
    root: usize,
    body_parents: Vec<(usize, Side)>,
}

impl Hierarchy {
    /// Flat "Jacobi" hierarchy used when no explicit tree is given
    ///
    /// Orbit 0 couples body 0 with body 1; orbit k couples orbit k-1 (the
    /// barycenter of bodies 0..=k) with body k+1.
    pub fn jacobi(n_bodies: usize) -> Result<Self, DynamicsError> {
        if n_bodies < 2 {
            return Err(DynamicsError::invalid_input(format!(
                "a hierarchy needs at least two bodies, got {}",
                n_bodies
            )));
        }

        let mut orbits = Vec::with_capacity(n_bodies - 1);
        orbits.push(OrbitNode::new(Component::Body(0), Component::Body(1)));
        for k in 1..n_bodies - 1 {
            orbits.push(OrbitNode::new(Component::Orbit(k - 1), Component::Body(k + 1)));
        }

        Self::new(n_bodies, orbits)
    }

    /// Build a hierarchy from an explicit list of orbits
    ///
    /// # Errors
    ///
    /// `InvalidInput` unless there are exactly N-1 orbits, every body is
    /// the child of exactly one orbit, every orbit but the root is the child
    /// of exactly one orbit, and the tree has no cycles.
    pub fn new(n_bodies: usize, orbits: Vec<OrbitNode>) -> Result<Self, DynamicsError> {
        if n_bodies < 2 {
            return Err(DynamicsError::invalid_input(format!(
                "a hierarchy needs at least two bodies, got {}",
                n_bodies
            )));
        }
        if orbits.len() != n_bodies - 1 {
            return Err(DynamicsError::invalid_input(format!(
                "{} bodies need {} orbits, got {}",
                n_bodies,
                n_bodies - 1,
                orbits.len()
            )));
        }

        let n_orbits = orbits.len();
        let mut body_parents: Vec<Option<(usize, Side)>> = vec![None; n_bodies];
        let mut orbit_parents: Vec<Option<usize>> = vec![None; n_orbits];

        for (k, node) in orbits.iter().enumerate() {
            for side in [Side::Primary, Side::Secondary] {
                match node.child(side) {
                    Component::Body(i) => {
                        let slot = body_parents.get_mut(i).ok_or_else(|| {
                            DynamicsError::invalid_input(format!(
                                "orbit {} references body {} but there are only {} bodies",
                                k, i, n_bodies
                            ))
                        })?;
                        if let Some((other, _)) = slot {
                            return Err(DynamicsError::invalid_input(format!(
                                "body {} is a child of both orbit {} and orbit {}",
                                i, other, k
                            )));
                        }
                        *slot = Some((k, side));
                    }
                    Component::Orbit(j) => {
                        if j == k {
                            return Err(DynamicsError::invalid_input(format!(
                                "orbit {} references itself",
                                k
                            )));
                        }
                        let slot = orbit_parents.get_mut(j).ok_or_else(|| {
                            DynamicsError::invalid_input(format!(
                                "orbit {} references orbit {} but there are only {} orbits",
                                k, j, n_orbits
                            ))
                        })?;
                        if let Some(other) = slot {
                            return Err(DynamicsError::invalid_input(format!(
                                "orbit {} is a child of both orbit {} and orbit {}",
                                j, other, k
                            )));
                        }
                        *slot = Some(k);
                    }
                }
            }
        }

        let body_parents = body_parents
            .into_iter()
            .enumerate()
            .map(|(i, parent)| {
                parent.ok_or_else(|| {
                    DynamicsError::invalid_input(format!("body {} is not part of any orbit", i))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let roots: Vec<usize> = orbit_parents
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.is_none())
            .map(|(k, _)| k)
            .collect();
        let root = match roots.as_slice() {
            [root] => *root,
            _ => {
                return Err(DynamicsError::invalid_input(format!(
                    "hierarchy must have exactly one root orbit, found {:?}",
                    roots
                )))
            }
        };

        let hierarchy = Self {
            n_bodies,
            orbits,
            root,
            body_parents,
        };

        // Orbits unreachable from the root can only sit on a cycle
        let reachable = hierarchy.orbits_top_down().len();
        if reachable != n_orbits {
            return Err(DynamicsError::invalid_input(format!(
                "hierarchy contains a cycle: only {} of {} orbits are reachable from root orbit {}",
                reachable, n_orbits, root
            )));
        }

        log::debug!(
            "Built hierarchy of {} bodies with root orbit {}",
            n_bodies,
            root
        );

        Ok(hierarchy)
    }

    pub fn n_bodies(&self) -> usize {
        self.n_bodies
    }

    pub fn n_orbits(&self) -> usize {
        self.orbits.len()
    }

    pub fn orbits(&self) -> &[OrbitNode] {
        &self.orbits
    }

    pub fn orbit(&self, index: usize) -> &OrbitNode {
        &self.orbits[index]
    }

    /// Index of the outermost orbit
    pub fn root(&self) -> usize {
        self.root
    }

    /// Orbit indices ordered so that every orbit precedes its children
    pub fn orbits_top_down(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.orbits.len());
        let mut stack = vec![self.root];

        while let Some(k) = stack.pop() {
            // Bounded walk: a cyclic input cannot loop forever
            if order.len() > self.orbits.len() || order.contains(&k) {
                break;
            }
            order.push(k);
            let node = &self.orbits[k];
            for child in [node.secondary, node.primary] {
                if let Component::Orbit(j) = child {
                    stack.push(j);
                }
            }
        }

        order
    }

    /// Bodies contained in a component, in primary-to-secondary order
    pub fn bodies_of(&self, component: Component) -> Vec<usize> {
        let mut bodies = Vec::new();
        self.collect_bodies(component, &mut bodies, 0);
        bodies
    }

    fn collect_bodies(&self, component: Component, out: &mut Vec<usize>, depth: usize) {
        if depth > self.orbits.len() {
            return;
        }
        match component {
            Component::Body(i) => out.push(i),
            Component::Orbit(k) => {
                let node = &self.orbits[k];
                self.collect_bodies(node.primary, out, depth + 1);
                self.collect_bodies(node.secondary, out, depth + 1);
            }
        }
    }

    /// Total mass of a component
    pub fn mass_of(&self, component: Component, masses: &[f64]) -> f64 {
        self.bodies_of(component).iter().map(|&i| masses[i]).sum()
    }

    /// Orbit that has `body` as a direct child, and the slot it occupies
    pub fn parent_of_body(&self, body: usize) -> (usize, Side) {
        self.body_parents[body]
    }

    /// The other child of the orbit that has `body` as a direct child
    pub fn sibling_of_body(&self, body: usize) -> Component {
        let (orbit, side) = self.body_parents[body];
        match side {
            Side::Primary => self.orbits[orbit].secondary,
            Side::Secondary => self.orbits[orbit].primary,
        }
    }

    /// Bodies forming the two-body partner of `body`
    pub fn sibling_bodies(&self, body: usize) -> Vec<usize> {
        self.bodies_of(self.sibling_of_body(body))
    }
}
