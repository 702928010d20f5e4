//! Scoped arena checkpoints.

use std::fmt;
use std::ops::Deref;

use crate::arena::Arena;

/// A saved cursor position on an arena.
///
/// Everything pushed through the checkpoint's arena after [`Temp::begin`]
/// is popped when the checkpoint is dropped or [`ended`](Temp::end).
/// Checkpoints nest in LIFO order: dropping an outer checkpoint also
/// discards allocations made under inner ones.
///
/// `A` is how the checkpoint holds its arena: `&Arena` for plain
/// checkpoints, `Rc<Arena>` for thread scratch.
#[must_use = "a checkpoint pops its allocations as soon as it is dropped"]
pub struct Temp<A: Deref<Target = Arena>> {
    arena: A,
    pos: usize,
}

impl<A: Deref<Target = Arena>> Temp<A> {
    /// Record the arena's current position.
    pub fn begin(arena: A) -> Self {
        let pos = arena.used();
        Self { arena, pos }
    }

    /// Pop back to the recorded position.
    pub fn end(self) {
        drop(self);
    }

    /// The arena this checkpoint restores.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Position recorded at [`Temp::begin`].
    pub fn pos(&self) -> usize {
        self.pos
    }
}

impl<A: Deref<Target = Arena>> Deref for Temp<A> {
    type Target = Arena;

    fn deref(&self) -> &Arena {
        &self.arena
    }
}

impl<A: Deref<Target = Arena>> Drop for Temp<A> {
    fn drop(&mut self) {
        self.arena.pop_to(self.pos);
    }
}

impl<A: Deref<Target = Arena>> fmt::Debug for Temp<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Temp")
            .field("arena", &self.arena.as_ptr())
            .field("pos", &self.pos)
            .field("used", &self.arena.used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_vm::page_size;

    fn arena() -> Arena {
        let a = Arena::new(64 * page_size());
        a.set_align(8);
        a
    }

    #[test]
    fn end_restores_position() {
        let a = arena();
        a.push(24);
        let t = a.temp_begin();
        assert_eq!(t.pos(), 24);
        t.push(100);
        t.push(7);
        assert!(a.used() > 24);
        t.end();
        assert_eq!(a.used(), 24);
    }

    #[test]
    fn drop_restores_position() {
        let a = arena();
        {
            let t = a.temp_begin();
            t.push(4096);
        }
        assert_eq!(a.used(), 0);
    }

    #[test]
    fn nested_checkpoints_unwind_in_order() {
        let a = arena();
        let outer = a.temp_begin();
        a.push(32);
        let inner = a.temp_begin();
        a.push(64);
        inner.end();
        assert_eq!(a.used(), 32);
        outer.end();
        assert_eq!(a.used(), 0);
    }

    #[test]
    fn checkpoint_survives_alignment_change() {
        let a = arena();
        a.push(3);
        let t = a.temp_begin();
        a.set_align(64);
        a.push(1);
        t.end();
        assert_eq!(a.used(), 8);
    }

    #[test]
    fn checkpoint_decommits_pages_it_grew() {
        let page = page_size();
        let a = arena();
        let before = a.committed();
        let t = a.temp_begin();
        a.push(10 * page);
        assert!(a.committed() > before);
        t.end();
        assert_eq!(a.committed(), before);
    }

    #[test]
    fn checkpoint_over_rc_arena() {
        let a = std::rc::Rc::new(arena());
        let t = Temp::begin(a.clone());
        t.push(48);
        assert_eq!(a.used(), 48);
        drop(t);
        assert_eq!(a.used(), 0);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn checkpoint_is_neutral(
                prefix in 0usize..8192,
                sizes in proptest::collection::vec(0usize..4 * 4096, 0..20),
            ) {
                let a = arena();
                a.push(prefix);
                let (used, committed) = (a.used(), a.committed());

                let t = a.temp_begin();
                for size in sizes {
                    let _ = t.try_push(size);
                }
                t.end();

                prop_assert_eq!(a.used(), used);
                prop_assert_eq!(a.committed(), committed);
            }
        }
    }
}
