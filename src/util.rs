use std::cell::Cell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub(crate) type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
pub(crate) type HashMap<K, V> = hashbrown::HashMap<K, V, BuildHasher>;
#[allow(unused)]
pub(crate) type HashSet<K> = hashbrown::HashSet<K, BuildHasher>;
pub(crate) type HEntry<'a, A, B> = hashbrown::hash_map::Entry<'a, A, B, BuildHasher>;
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasher>;
pub type IndexSet<K> = indexmap::IndexSet<K, BuildHasher>;

/// A generation counter that can be shared between caches.
///
/// Every name minted by a [`NameGen`] embeds the generation it was minted in,
/// so names from different generations never collide.
#[derive(Debug, Clone, Default)]
pub struct Generation(Rc<Cell<usize>>);

impl Generation {
    pub fn get(&self) -> usize {
        self.0.get()
    }

    pub fn advance(&self) -> usize {
        let next = self.0.get() + 1;
        self.0.set(next);
        next
    }
}

/// Generates fresh names of the form `{kernel}_{generation}_{counter}`.
#[derive(Debug, Clone)]
pub struct NameGen {
    kernel: String,
    generation: Generation,
    count: usize,
}

impl NameGen {
    pub fn new(kernel: impl Into<String>, generation: Generation) -> Self {
        Self {
            kernel: kernel.into(),
            generation,
            count: 0,
        }
    }

    pub fn fresh(&mut self) -> String {
        let s = format!("{}_{}_{}", self.kernel, self.generation.get(), self.count);
        self.count += 1;
        s
    }

    pub fn kernel(&self) -> &str {
        &self.kernel
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    pub(crate) fn reset_count(&mut self) {
        self.count = 0;
    }
}

pub(crate) struct ListDisplay<'a, T>(pub &'a [T], pub &'a str);

impl<T: Display> Display for ListDisplay<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut did_something = false;
        for item in self.0.iter() {
            if did_something {
                f.write_str(self.1)?;
            }
            Display::fmt(item, f)?;
            did_something = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_embed_generation() {
        let generation = Generation::default();
        let mut names = NameGen::new("__cse", generation.clone());
        assert_eq!(names.fresh(), "__cse_0_0");
        assert_eq!(names.fresh(), "__cse_0_1");
        generation.advance();
        assert_eq!(names.fresh(), "__cse_1_2");
    }

    #[test]
    fn shared_generation() {
        let generation = Generation::default();
        let mut a = NameGen::new("a", generation.clone());
        let mut b = NameGen::new("b", generation.clone());
        a.generation().advance();
        assert_eq!(b.fresh(), "b_1_0");
        b.reset_count();
        assert_eq!(a.fresh(), "a_1_0");
    }
}
