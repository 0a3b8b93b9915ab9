//! GP-tree representation: symbols, nodes, the two generation strategies and
//! the subtree-level genetic operators.

use crate::error::{CanopyError, Result};
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shape of a generated tree: `grow` lets leaves fall anywhere up to the
/// depth bound, `full` pushes every leaf down to exactly the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenMethod {
    Grow,
    Full,
}

impl fmt::Display for GenMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenMethod::Grow => write!(f, "grow"),
            GenMethod::Full => write!(f, "full"),
        }
    }
}

enum SymbolKind<V> {
    /// Arity >= 1 behavior; receives one evaluated value per child.
    Function(Arc<dyn Fn(&[V]) -> V + Send + Sync>),
    /// Zero-arity behavior (a constant or sensor supplied by the caller).
    Constant(Arc<dyn Fn() -> V + Send + Sync>),
    /// Positional reference into the argument vector passed to `evaluate`.
    Argument(usize),
}

impl<V> Clone for SymbolKind<V> {
    fn clone(&self) -> Self {
        match self {
            SymbolKind::Function(behavior) => SymbolKind::Function(behavior.clone()),
            SymbolKind::Constant(behavior) => SymbolKind::Constant(behavior.clone()),
            SymbolKind::Argument(index) => SymbolKind::Argument(*index),
        }
    }
}

/// A registered name with its declared arity and behavior. Arity is part of
/// the registration contract; the engine never inspects the behavior itself.
pub struct Symbol<V> {
    name: String,
    arity: usize,
    kind: SymbolKind<V>,
}

impl<V> Clone for Symbol<V> {
    fn clone(&self) -> Self {
        Symbol {
            name: self.name.clone(),
            arity: self.arity,
            kind: self.kind.clone(),
        }
    }
}

impl<V> fmt::Debug for Symbol<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl<V> Symbol<V> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

/// One node of a GP-tree. A node exclusively owns its children, so `clone`
/// is a deep copy and two trees never share mutable structure. The number of
/// children always equals the symbol's declared arity.
pub struct Node<V> {
    symbol: Symbol<V>,
    children: Vec<Node<V>>,
}

impl<V> Clone for Node<V> {
    fn clone(&self) -> Self {
        Node {
            symbol: self.symbol.clone(),
            children: self.children.clone(),
        }
    }
}

impl<V> Node<V> {
    fn with_symbol(symbol: Symbol<V>) -> Node<V> {
        let arity = symbol.arity;
        Node {
            symbol,
            children: Vec::with_capacity(arity),
        }
    }

    pub fn name(&self) -> &str {
        &self.symbol.name
    }

    pub fn arity(&self) -> usize {
        self.symbol.arity
    }

    pub fn children(&self) -> &[Node<V>] {
        &self.children
    }
}

impl<V: Clone> Node<V> {
    /// Evaluate the tree bottom-up against an external argument vector.
    /// Supplying enough arguments for every registered argument reference is
    /// the caller's contract; a short vector yields `ArgumentIndex`.
    pub fn evaluate(&self, args: &[V]) -> Result<V> {
        match &self.symbol.kind {
            SymbolKind::Argument(index) => {
                args.get(*index).cloned().ok_or(CanopyError::ArgumentIndex {
                    index: *index,
                    supplied: args.len(),
                })
            }
            SymbolKind::Constant(behavior) => Ok(behavior()),
            SymbolKind::Function(behavior) => {
                let mut values = Vec::with_capacity(self.children.len());
                for child in &self.children {
                    values.push(child.evaluate(args)?);
                }
                Ok(behavior(&values))
            }
        }
    }
}

/// Parenthesized prefix form: `(name child1 child2 ...)`, bare name for
/// leaves. Purely structural, independent of evaluation.
impl<V> fmt::Display for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.children.is_empty() {
            write!(f, "{}", self.symbol.name)
        } else {
            write!(f, "({}", self.symbol.name)?;
            for child in &self.children {
                write!(f, " {}", child)?;
            }
            write!(f, ")")
        }
    }
}

impl<V> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Registry of caller-supplied symbols, partitioned by arity into functions
/// (arity >= 1) and terminals (arity 0). Read-only during a run; picks are
/// uniform per name, with replacement.
pub struct SymbolSet<V> {
    functions: Vec<Symbol<V>>,
    terminals: Vec<Symbol<V>>,
}

impl<V> Default for SymbolSet<V> {
    fn default() -> Self {
        SymbolSet {
            functions: vec![],
            terminals: vec![],
        }
    }
}

impl<V> SymbolSet<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function symbol. Declaring arity 0 here is a configuration
    /// error; zero-arity behaviors go through `add_terminal`.
    pub fn add_function<F>(&mut self, name: &str, arity: usize, behavior: F) -> Result<()>
    where
        F: Fn(&[V]) -> V + Send + Sync + 'static,
    {
        if arity == 0 {
            return Err(CanopyError::Config(format!(
                "function '{}' must have an arity of at least 1",
                name
            )));
        }
        self.insert(Symbol {
            name: name.to_string(),
            arity,
            kind: SymbolKind::Function(Arc::new(behavior)),
        });
        Ok(())
    }

    pub fn add_terminal<F>(&mut self, name: &str, behavior: F)
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        self.insert(Symbol {
            name: name.to_string(),
            arity: 0,
            kind: SymbolKind::Constant(Arc::new(behavior)),
        });
    }

    pub fn add_argument(&mut self, name: &str, index: usize) {
        self.insert(Symbol {
            name: name.to_string(),
            arity: 0,
            kind: SymbolKind::Argument(index),
        });
    }

    // re-registering a name replaces the previous entry
    fn insert(&mut self, symbol: Symbol<V>) {
        self.functions.retain(|s| s.name != symbol.name);
        self.terminals.retain(|s| s.name != symbol.name);
        if symbol.arity > 0 {
            self.functions.push(symbol);
        } else {
            self.terminals.push(symbol);
        }
    }

    pub fn pick_function(&self, rng: &mut Rng) -> Result<&Symbol<V>> {
        if self.functions.is_empty() {
            return Err(CanopyError::Config(
                "at least one function must be registered".to_string(),
            ));
        }
        Ok(&self.functions[rng.usize(..self.functions.len())])
    }

    pub fn pick_terminal(&self, rng: &mut Rng) -> Result<&Symbol<V>> {
        if self.terminals.is_empty() {
            return Err(CanopyError::Config(
                "at least one terminal must be registered".to_string(),
            ));
        }
        Ok(&self.terminals[rng.usize(..self.terminals.len())])
    }

    pub fn pick_any(&self, rng: &mut Rng) -> Result<&Symbol<V>> {
        let total = self.functions.len() + self.terminals.len();
        if total == 0 {
            return Err(CanopyError::Config(
                "no symbols have been registered".to_string(),
            ));
        }
        let index = rng.usize(..total);
        Ok(if index < self.functions.len() {
            &self.functions[index]
        } else {
            &self.terminals[index - self.functions.len()]
        })
    }

    fn ensure_ready(&self, depth: usize) -> Result<()> {
        if self.functions.is_empty() {
            return Err(CanopyError::Config(
                "at least one function must be registered".to_string(),
            ));
        }
        if self.terminals.is_empty() {
            return Err(CanopyError::Config(
                "at least one terminal must be registered".to_string(),
            ));
        }
        if depth == 0 {
            return Err(CanopyError::Config(
                "tree depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate a fresh tree rooted at a randomly picked function (depth 0).
    /// With `full` every leaf lands at exactly `depth`; with `grow` leaves
    /// land anywhere at depth <= `depth`.
    pub fn generate(&self, method: GenMethod, depth: usize, rng: &mut Rng) -> Result<Node<V>> {
        self.ensure_ready(depth)?;
        let mut root = Node::with_symbol(self.pick_function(rng)?.clone());
        self.fill(&mut root, method, depth - 1, rng)?;
        Ok(root)
    }

    fn fill(&self, node: &mut Node<V>, method: GenMethod, remaining: usize, rng: &mut Rng) -> Result<()> {
        for _ in 0..node.symbol.arity {
            let mut child = if remaining > 0 {
                let symbol = match method {
                    GenMethod::Grow => self.pick_any(rng)?,
                    GenMethod::Full => self.pick_function(rng)?,
                };
                Node::with_symbol(symbol.clone())
            } else {
                Node::with_symbol(self.pick_terminal(rng)?.clone())
            };
            if remaining > 0 {
                self.fill(&mut child, method, remaining - 1, rng)?;
            }
            node.children.push(child);
        }
        Ok(())
    }

    /// Mutate `tree` in place: pick a subtree via the biased locator, turn it
    /// into a function node if it was a leaf, then regenerate its children
    /// with the given method and depth. Prior children are discarded.
    pub fn mutate(&self, tree: &mut Node<V>, method: GenMethod, depth: usize, rng: &mut Rng) -> Result<()> {
        self.ensure_ready(depth)?;
        let (target, _) = locate_random_subtree_mut(tree, rng);
        if target.symbol.arity == 0 {
            target.symbol = self.pick_function(rng)?.clone();
        }
        target.children.clear();
        self.fill(target, method, depth - 1, rng)
    }
}

fn random_descent_path<V>(root: &Node<V>, rng: &mut Rng) -> Vec<usize> {
    let mut path = vec![];
    let mut node = root;
    while !node.children.is_empty() {
        let pick = rng.usize(..node.children.len());
        path.push(pick);
        node = &node.children[pick];
    }
    path
}

/// Biased random subtree selection, shared by mutation and crossover: walk
/// one random root-to-leaf path (uniform child pick at every internal node),
/// then draw a target depth uniformly from {1..L} where L is the path
/// length, and return the node at that depth on the same path together with
/// the depth. The root is only ever returned for a childless root, which the
/// generation strategies cannot produce.
///
/// This is deliberately not a uniform-over-nodes sampler; the depth-on-path
/// bias is part of the engine's observed evolutionary behavior.
pub fn locate_random_subtree<'a, V>(root: &'a Node<V>, rng: &mut Rng) -> (&'a Node<V>, usize) {
    let path = random_descent_path(root, rng);
    if path.is_empty() {
        return (root, 0);
    }
    let target = rng.usize(1..=path.len());
    let mut node = root;
    for &child in &path[..target] {
        node = &node.children[child];
    }
    (node, target)
}

pub fn locate_random_subtree_mut<'a, V>(root: &'a mut Node<V>, rng: &mut Rng) -> (&'a mut Node<V>, usize) {
    let path = random_descent_path(root, rng);
    if path.is_empty() {
        return (root, 0);
    }
    let target = rng.usize(1..=path.len());
    let mut node = root;
    for &child in &path[..target] {
        node = &mut node.children[child];
    }
    (node, target)
}

/// Recombine two trees into a fresh offspring: deep-clone `a`, then
/// overwrite a located target in the clone with a deep clone of a located
/// donor subtree from `b`. The offspring shares no structure with either
/// parent.
pub fn crossover<V: Clone>(a: &Node<V>, b: &Node<V>, rng: &mut Rng) -> Node<V> {
    let mut offspring = a.clone();
    let (donor, _) = locate_random_subtree(b, rng);
    let donor = donor.clone();
    let (target, _) = locate_random_subtree_mut(&mut offspring, rng);
    *target = donor;
    offspring
}
