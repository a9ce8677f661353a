use std::collections::HashMap;

macro_rules! hashmap {
    ($( $key: expr => $val: expr ),* $(,)?) => {{
         let mut map = ::std::collections::HashMap::new();
         $( map.insert($key, $val); )*
         map
    }}
}

/// Substitution scoring for the sequence aligner. The aligner only sees
/// this trait, so the embedded table can be swapped for another matrix.
pub trait SubstMatrix {
    /// Score for aligning one-letter codes `a` and `b`. Unknown symbols
    /// (including gaps) score zero.
    fn score(&self, a: char, b: char) -> i32;
}

lazy_static! {
    static ref AA_INDEX: HashMap<char, usize> = hashmap![
        'A' => 0, 'R' => 1, 'N' => 2, 'D' => 3, 'C' => 4, 'Q' => 5,
        'E' => 6, 'G' => 7, 'H' => 8, 'I' => 9, 'L' => 10, 'K' => 11,
        'M' => 12, 'F' => 13, 'P' => 14, 'S' => 15, 'T' => 16, 'W' => 17,
        'Y' => 18, 'V' => 19, 'B' => 20, 'Z' => 21, 'X' => 22,
    ];
}

// Mutation data matrix, Dayhoff 1978 (PAM250 log-odds), row order
// A R N D C Q E G H I L K M F P S T W Y V B Z X.
const MDM78: [[i32; 23]; 23] = [
    [2, -2, 0, 0, -2, 0, 0, 1, -1, -1, -2, -1, -1, -3, 1, 1, 1, -6, -3, 0, 0, 0, 0],
    [-2, 6, 0, -1, -4, 1, -1, -3, 2, -2, -3, 3, 0, -4, 0, 0, -1, 2, -4, -2, -1, 0, -1],
    [0, 0, 2, 2, -4, 1, 1, 0, 2, -2, -3, 1, -2, -3, 0, 1, 0, -4, -2, -2, 2, 1, 0],
    [0, -1, 2, 4, -5, 2, 3, 1, 1, -2, -4, 0, -3, -6, -1, 0, 0, -7, -4, -2, 3, 3, -1],
    [-2, -4, -4, -5, 12, -5, -5, -3, -3, -2, -6, -5, -5, -4, -3, 0, -2, -8, 0, -2, -4, -5, -3],
    [0, 1, 1, 2, -5, 4, 2, -1, 3, -2, -2, 1, -1, -5, 0, -1, -1, -5, -4, -2, 1, 3, -1],
    [0, -1, 1, 3, -5, 2, 4, 0, 1, -2, -3, 0, -2, -5, -1, 0, 0, -7, -4, -2, 3, 3, -1],
    [1, -3, 0, 1, -3, -1, 0, 5, -2, -3, -4, -2, -3, -5, 0, 1, 0, -7, -5, -1, 0, 0, -1],
    [-1, 2, 2, 1, -3, 3, 1, -2, 6, -2, -2, 0, -2, -2, 0, -1, -1, -3, 0, -2, 1, 2, -1],
    [-1, -2, -2, -2, -2, -2, -2, -3, -2, 5, 2, -2, 2, 1, -2, -1, 0, -5, -1, 4, -2, -2, -1],
    [-2, -3, -3, -4, -6, -2, -3, -4, -2, 2, 6, -3, 4, 2, -3, -3, -2, -2, -1, 2, -3, -3, -1],
    [-1, 3, 1, 0, -5, 1, 0, -2, 0, -2, -3, 5, 0, -5, -1, 0, 0, -3, -4, -2, 1, 0, -1],
    [-1, 0, -2, -3, -5, -1, -2, -3, -2, 2, 4, 0, 6, 0, -2, -2, -1, -4, -2, 2, -2, -2, -1],
    [-3, -4, -3, -6, -4, -5, -5, -5, -2, 1, 2, -5, 0, 9, -5, -3, -3, 0, 7, -1, -4, -5, -2],
    [1, 0, 0, -1, -3, 0, -1, 0, 0, -2, -3, -1, -2, -5, 6, 1, 0, -6, -5, -1, -1, 0, -1],
    [1, 0, 1, 0, 0, -1, 0, 1, -1, -1, -3, 0, -2, -3, 1, 2, 1, -2, -3, -1, 0, 0, 0],
    [1, -1, 0, 0, -2, -1, 0, 0, -1, 0, -2, 0, -1, -3, 0, 1, 3, -5, -3, 0, 0, -1, 0],
    [-6, 2, -4, -7, -8, -5, -7, -7, -3, -5, -2, -3, -4, 0, -6, -2, -5, 17, 0, -6, -5, -6, -4],
    [-3, -4, -2, -4, 0, -4, -4, -5, 0, -1, -1, -4, -2, 7, -5, -3, -3, 0, 10, -2, -3, -4, -2],
    [0, -2, -2, -2, -2, -2, -2, -1, -2, 4, 2, -2, 2, -1, -1, -1, 0, -6, -2, 4, -2, -2, -1],
    [0, -1, 2, 3, -4, 1, 3, 0, 1, -2, -3, 1, -2, -4, -1, 0, 0, -5, -3, -2, 3, 2, -1],
    [0, 0, 1, 3, -5, 3, 3, 0, 2, -2, -3, 0, -2, -5, 0, 0, -1, -6, -4, -2, 2, 3, -1],
    [0, -1, 0, -1, -3, -1, -1, -1, -1, -1, -1, -1, -1, -2, -1, 0, 0, -4, -2, -1, -1, -1, -1],
];

/// The built-in mutation data matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mdm78;

impl SubstMatrix for Mdm78 {
    fn score(&self, a: char, b: char) -> i32 {
        let a = AA_INDEX.get(&a.to_ascii_uppercase());
        let b = AA_INDEX.get(&b.to_ascii_uppercase());
        match (a, b) {
            (Some(&i), Some(&j)) => MDM78[i][j],
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_is_symmetric() {
        for i in 0..23 {
            for j in 0..23 {
                assert_eq!(MDM78[i][j], MDM78[j][i], "asymmetry at ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn known_scores() {
        let m = Mdm78;
        assert_eq!(m.score('W', 'W'), 17);
        assert_eq!(m.score('A', 'A'), 2);
        assert_eq!(m.score('W', 'A'), -6);
        assert_eq!(m.score('a', 'a'), 2);
    }

    #[test]
    fn unknown_symbols_score_zero() {
        let m = Mdm78;
        assert_eq!(m.score('-', 'A'), 0);
        assert_eq!(m.score('*', '*'), 0);
    }
}
