//! Arithmetic problems that must be solved before an alarm can be dismissed.

use std::fmt;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
}

impl Operation {
    const ALL: [Self; 3] = [Self::Add, Self::Subtract, Self::Multiply];

    const fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '×',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MathChallenge {
    a: u32,
    b: u32,
    operation: Operation,
}

impl MathChallenge {
    /// Operand ranges keep the answer positive and solvable half asleep.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let operation = Operation::ALL[rng.gen_range(0..Operation::ALL.len())];
        let (a, b) = match operation {
            Operation::Add => (rng.gen_range(10..60), rng.gen_range(10..60)),
            Operation::Subtract => (rng.gen_range(30..80), rng.gen_range(1..31)),
            Operation::Multiply => (rng.gen_range(2..14), rng.gen_range(2..14)),
        };
        Self { a, b, operation }
    }

    #[must_use]
    pub const fn answer(&self) -> u32 {
        match self.operation {
            Operation::Add => self.a + self.b,
            Operation::Subtract => self.a - self.b,
            Operation::Multiply => self.a * self.b,
        }
    }

    /// Anything that isn't the right integer, including garbage, is wrong.
    #[must_use]
    pub fn check(&self, input: &str) -> bool {
        input
            .trim()
            .parse::<i64>()
            .is_ok_and(|guess| guess == i64::from(self.answer()))
    }
}

impl fmt::Display for MathChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.a, self.operation.symbol(), self.b)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn generated_problems_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = Vec::new();
        for _ in 0..500 {
            let challenge = MathChallenge::generate(&mut rng);
            let MathChallenge { a, b, operation } = challenge;
            match operation {
                Operation::Add => assert!((10..60).contains(&a) && (10..60).contains(&b)),
                Operation::Subtract => {
                    assert!((30..80).contains(&a) && (1..31).contains(&b));
                    assert!(challenge.answer() < a);
                }
                Operation::Multiply => assert!((2..14).contains(&a) && (2..14).contains(&b)),
            }
            if !seen.contains(&operation) {
                seen.push(operation);
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn checks_answers() {
        let challenge = MathChallenge {
            a: 7,
            b: 8,
            operation: Operation::Multiply,
        };
        assert_eq!(challenge.to_string(), "7 × 8");
        assert!(challenge.check("56"));
        assert!(challenge.check("  56\n"));
        assert!(!challenge.check("55"));
        assert!(!challenge.check("fifty six"));
        assert!(!challenge.check(""));
    }
}
