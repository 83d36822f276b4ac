use crate::cell::{Cell, Wint, ZERO};
use crate::throw::{Throw, Wres, Wres1, OK};

const FRAME_NONE: usize = usize::MAX;

/// Fixed-capacity cell stack. Capacity is set at creation and never grows;
/// the owning VM decides which throw codes over/underflow report so the data
/// and return stacks stay distinguishable.
#[derive(Clone, Debug)]
pub struct Stack {
    cells: Vec<Cell>,
    cap: usize,
    frame: usize,
    overflow: Throw,
    underflow: Throw,
}

impl Stack {
    pub fn new(cap: usize, overflow: Throw, underflow: Throw) -> Stack {
        Stack {
            cells: Vec::with_capacity(cap.min(1024)),
            cap,
            frame: FRAME_NONE,
            overflow,
            underflow,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.frame = FRAME_NONE;
    }

    pub fn push(&mut self, c: Cell) -> Wres {
        if self.cells.len() >= self.cap {
            return Err(self.overflow);
        }
        self.cells.push(c);
        OK
    }

    pub fn pop(&mut self) -> Wres1<Cell> {
        self.cells.pop().ok_or(self.underflow)
    }

    /// n-th cell from the top, zero being the top itself.
    pub fn peek(&self, n: usize) -> Wres1<&Cell> {
        let len = self.cells.len();
        if n < len {
            Ok(&self.cells[len - 1 - n])
        } else {
            Err(self.underflow)
        }
    }

    pub fn set(&mut self, n: usize, c: Cell) -> Wres {
        let len = self.cells.len();
        if n < len {
            self.cells[len - 1 - n] = c;
            OK
        } else {
            Err(self.underflow)
        }
    }

    pub fn drop_n(&mut self, n: usize) -> Wres {
        let len = self.cells.len();
        if n <= len {
            self.cells.truncate(len - n);
            OK
        } else {
            Err(self.underflow)
        }
    }

    /// Copy the n-th cell from the top onto the top.
    pub fn pick(&mut self, n: usize) -> Wres {
        let c = self.peek(n)?.clone();
        self.push(c)
    }

    /// Rotate the n-th cell from the top to the top (positive n), or the top
    /// down to depth |n| (negative n), preserving the order of the cells
    /// skipped over. Zero distance is a no-op.
    pub fn roll(&mut self, n: Wint) -> Wres {
        if n == 0 {
            return OK;
        }
        let dist = n.unsigned_abs() as usize;
        let len = self.cells.len();
        if dist >= len {
            return Err(self.underflow);
        }
        if n > 0 {
            let c = self.cells.remove(len - 1 - dist);
            self.cells.push(c);
        } else {
            let c = self.cells.pop().ok_or(self.underflow)?;
            self.cells.insert(len - 1 - dist, c);
        }
        OK
    }

    /// Open a locals frame: the prior frame pointer is saved on the stack
    /// itself so frames nest and unwind with the stack.
    pub fn link(&mut self) -> Wres {
        let saved = self.frame as Wint;
        self.push(Cell::Int(saved))?;
        self.frame = self.cells.len();
        OK
    }

    /// Close the current frame, dropping its slots and the saved pointer.
    pub fn unlink(&mut self) -> Wres {
        if self.frame == FRAME_NONE || self.frame == 0 {
            return Err(self.underflow);
        }
        let at = self.frame - 1;
        let saved = self.cells[at].to_int()?;
        self.cells.truncate(at);
        self.frame = saved as usize;
        OK
    }

    pub fn local(&self, slot: usize) -> Wres1<Cell> {
        if self.frame == FRAME_NONE {
            return Err(self.underflow);
        }
        self.cells.get(self.frame + slot).cloned().ok_or(self.underflow)
    }

    pub fn set_local(&mut self, slot: usize, c: Cell) -> Wres {
        if self.frame == FRAME_NONE {
            return Err(self.underflow);
        }
        let at = self.frame + slot;
        if at < self.cells.len() {
            self.cells[at] = c;
            OK
        } else {
            Err(self.underflow)
        }
    }

    /// Force the depth back to a snapshot taken earlier. Cells consumed
    /// below the snapshot come back zero-filled; the caller knows restored
    /// contents below a throw are unspecified.
    pub fn restore_depth(&mut self, depth: usize) {
        if self.cells.len() > depth {
            self.cells.truncate(depth);
        } else {
            while self.cells.len() < depth {
                self.cells.push(ZERO);
            }
        }
        if self.frame != FRAME_NONE && self.frame > self.cells.len() {
            self.frame = FRAME_NONE;
        }
    }

    /// Bottom-to-top walk for diagnostics; reverse for top-down.
    pub fn iter(&self) -> std::slice::Iter<Cell> {
        self.cells.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Stack {
        Stack::new(4, Throw::STACK_OVERFLOW, Throw::STACK_UNDERFLOW)
    }

    #[test]
    fn test_push_pop_discipline() {
        let mut s = small();
        for n in 0..4 {
            s.push(Cell::Int(n)).unwrap();
        }
        assert_eq!(4, s.len());
        assert_eq!(Err(Throw::STACK_OVERFLOW), s.push(ZERO));
        assert_eq!(4, s.len());
        assert_eq!(Ok(Cell::Int(3)), s.pop());
        assert_eq!(Ok(Cell::Int(2)), s.pop());
        assert_eq!(2, s.len());
        s.drop_n(2).unwrap();
        assert_eq!(Err(Throw::STACK_UNDERFLOW), s.pop());
        assert_eq!(0, s.len());
    }

    #[test]
    fn test_peek_pick() {
        let mut s = small();
        s.push(Cell::Int(10)).unwrap();
        s.push(Cell::Int(20)).unwrap();
        assert_eq!(Ok(&Cell::Int(20)), s.peek(0));
        assert_eq!(Ok(&Cell::Int(10)), s.peek(1));
        assert_eq!(Err(Throw::STACK_UNDERFLOW), s.peek(2));
        s.pick(1).unwrap();
        assert_eq!(Ok(&Cell::Int(10)), s.peek(0));
        assert_eq!(3, s.len());
    }

    #[test]
    fn test_roll_both_directions() {
        let mut s = Stack::new(8, Throw::STACK_OVERFLOW, Throw::STACK_UNDERFLOW);
        for n in [1, 2, 3, 4] {
            s.push(Cell::Int(n)).unwrap();
        }
        s.roll(2).unwrap();
        let got: Vec<Wint> = s.iter().map(|c| c.to_int().unwrap()).collect();
        assert_eq!(vec![1, 3, 4, 2], got);
        s.roll(-2).unwrap();
        let got: Vec<Wint> = s.iter().map(|c| c.to_int().unwrap()).collect();
        assert_eq!(vec![1, 2, 3, 4], got);
        s.roll(0).unwrap();
        let got: Vec<Wint> = s.iter().map(|c| c.to_int().unwrap()).collect();
        assert_eq!(vec![1, 2, 3, 4], got);
        assert_eq!(Err(Throw::STACK_UNDERFLOW), s.roll(4));
        assert_eq!(4, s.len());
    }

    #[test]
    fn test_frames() {
        let mut s = Stack::new(16, Throw::RETURN_STACK_OVERFLOW, Throw::RETURN_STACK_UNDERFLOW);
        s.push(Cell::Int(99)).unwrap();
        s.link().unwrap();
        s.push(Cell::Int(1)).unwrap();
        s.push(Cell::Int(2)).unwrap();
        assert_eq!(Ok(Cell::Int(1)), s.local(0));
        assert_eq!(Ok(Cell::Int(2)), s.local(1));
        s.set_local(0, Cell::Int(7)).unwrap();
        assert_eq!(Ok(Cell::Int(7)), s.local(0));
        // nested frame sees only its own slots
        s.link().unwrap();
        s.push(Cell::Int(5)).unwrap();
        assert_eq!(Ok(Cell::Int(5)), s.local(0));
        s.unlink().unwrap();
        assert_eq!(Ok(Cell::Int(7)), s.local(0));
        s.unlink().unwrap();
        assert_eq!(1, s.len());
        assert_eq!(Ok(Cell::Int(99)), s.pop());
    }

    #[test]
    fn test_restore_depth() {
        let mut s = small();
        s.push(Cell::Int(1)).unwrap();
        s.push(Cell::Int(2)).unwrap();
        s.push(Cell::Int(3)).unwrap();
        s.restore_depth(1);
        assert_eq!(1, s.len());
        s.restore_depth(3);
        assert_eq!(3, s.len());
        assert_eq!(Ok(&ZERO), s.peek(0));
        assert_eq!(Ok(&Cell::Int(1)), s.peek(2));
    }
}
