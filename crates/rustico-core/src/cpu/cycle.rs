#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Cycle {
    Normal(u8),
    Cross(u8),
    Branch(u8),
}

const fn n(cycle: u8) -> Cycle {
    Cycle::Normal(cycle)
}

const fn c(cycle: u8) -> Cycle {
    Cycle::Cross(cycle)
}

const fn b(cycle: u8) -> Cycle {
    Cycle::Branch(cycle)
}

impl Cycle {
    pub(crate) const fn basic_cycle(&self) -> u8 {
        match self {
            Cycle::Normal(cycle) | Cycle::Cross(cycle) | Cycle::Branch(cycle) => *cycle,
        }
    }

    /// Total CPU cycles this instruction consumes given whether its operand
    /// fetch crossed a page boundary and, for branches, whether it was taken.
    pub(crate) fn total_cycle(&self, crossed_page: bool, branch_taken: bool) -> u8 {
        match self {
            Cycle::Normal(cycle) => *cycle,
            Cycle::Cross(cycle) => cycle + crossed_page as u8,
            Cycle::Branch(cycle) => {
                if !branch_taken {
                    *cycle
                } else {
                    cycle + 1 + crossed_page as u8
                }
            }
        }
    }
}

#[rustfmt::skip]
pub(crate) static CYCLE_TABLE: [Cycle; 256] = [
    n(7), n(6), n(0), n(8), n(3), n(3), n(5), n(5), n(3), n(2), n(2), n(2), n(4), n(4), n(6), n(6), 
    b(2), c(5), n(0), n(8), n(4), n(4), n(6), n(6), n(2), c(4), n(2), n(7), c(4), c(4), n(7), n(7), 
    n(6), n(6), n(0), n(8), n(3), n(3), n(5), n(5), n(4), n(2), n(2), n(2), n(4), n(4), n(6), n(6), 
    b(2), c(5), n(0), n(8), n(4), n(4), n(6), n(6), n(2), c(4), n(2), n(7), c(4), c(4), n(7), n(7), 
    n(6), n(6), n(0), n(8), n(3), n(3), n(5), n(5), n(3), n(2), n(2), n(2), n(3), n(4), n(6), n(6), 
    b(2), c(5), n(0), n(8), n(4), n(4), n(6), n(6), n(2), c(4), n(2), n(7), c(4), c(4), n(7), n(7), 
    n(6), n(6), n(0), n(8), n(3), n(3), n(5), n(5), n(4), n(2), n(2), n(2), n(5), n(4), n(6), n(6), 
    b(2), c(5), n(0), n(8), n(4), n(4), n(6), n(6), n(2), c(4), n(2), n(7), c(4), c(4), n(7), n(7), 
    n(2), n(6), n(2), n(6), n(3), n(3), n(3), n(3), n(2), n(2), n(2), n(2), n(4), n(4), n(4), n(4), 
    b(2), n(6), n(0), n(6), n(4), n(4), n(4), n(4), n(2), n(5), n(2), n(5), n(5), n(5), n(5), n(5), 
    n(2), n(6), n(2), n(6), n(3), n(3), n(3), n(3), n(2), n(2), n(2), n(2), n(4), n(4), n(4), n(4), 
    b(2), c(5), n(0), c(5), n(4), n(4), n(4), n(4), n(2), c(4), n(2), c(4), c(4), c(4), c(4), c(4), 
    n(2), n(6), n(2), n(8), n(3), n(3), n(5), n(5), n(2), n(2), n(2), n(2), n(4), n(4), n(6), n(6), 
    b(2), c(5), n(0), n(8), n(4), n(4), n(6), n(6), n(2), c(4), n(2), n(7), c(4), c(4), n(7), n(7), 
    n(2), n(6), n(2), n(8), n(3), n(3), n(5), n(5), n(2), n(2), n(2), n(2), n(4), n(4), n(6), n(6), 
    b(2), c(5), n(0), n(8), n(4), n(4), n(6), n(6), n(2), c(4), n(2), n(7), c(4), c(4), n(7), n(7), 
];