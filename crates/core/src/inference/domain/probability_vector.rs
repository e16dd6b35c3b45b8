/// Per-class scores for one word, in vocabulary order.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbabilityVector(Vec<f32>);

impl ProbabilityVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the highest score. Ties go to the lowest index.
    ///
    /// NaN scores are skipped, unlike `numpy.argmax`, which returns the
    /// first NaN. An all-NaN vector has no arg-max.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &score) in self.0.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((i, score)),
            }
        }
        best.map(|(i, _)| i)
    }
}

impl From<Vec<f32>> for ProbabilityVector {
    fn from(scores: Vec<f32>) -> Self {
        Self::new(scores)
    }
}
