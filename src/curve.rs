use crate::math::{cardano_root_in_unit, lerp};
use glam::Vec2;

/// One keyframe on a motion curve's time axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub time: f32,
    pub value: f32,
}

impl ControlPoint {
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }

    fn as_vec2(self) -> Vec2 {
        Vec2::new(self.time, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Linear,
    Bezier,
    /// Constant hold of the segment's first point.
    Stepped,
    /// Immediate jump to the segment's second point.
    InverseStepped,
}

impl SegmentKind {
    /// Number of control points the segment spans, boundary points included.
    pub fn point_span(self) -> usize {
        match self {
            SegmentKind::Bezier => 4,
            _ => 2,
        }
    }
}

/// A segment references a contiguous slice of its curve's point pool;
/// consecutive segments share their boundary point.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub kind: SegmentKind,
    pub base_point: usize,
}

/// How the bezier time axis is inverted. Authoring tools that restrict the
/// control-point x positions can use the cheap ratio approximation; Cardano
/// is exact and the default for unrestricted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BezierSolver {
    TimeRatio,
    BinarySearch,
    #[default]
    Cardano,
}

fn de_casteljau(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let q0 = p0.lerp(p1, t);
    let q1 = p1.lerp(p2, t);
    let q2 = p2.lerp(p3, t);
    let r0 = q0.lerp(q1, t);
    let r1 = q1.lerp(q2, t);
    r0.lerp(r1, t)
}

fn linear_evaluate(points: &[ControlPoint], time: f32) -> f32 {
    let span = points[1].time - points[0].time;
    let t = if span > 0.0 { ((time - points[0].time) / span).clamp(0.0, 1.0) } else { 0.0 };
    lerp(points[0].value, points[1].value, t)
}

fn bezier_time_ratio(points: &[ControlPoint], time: f32) -> f32 {
    let span = points[3].time - points[0].time;
    let t = if span > 0.0 { ((time - points[0].time) / span).clamp(0.0, 1.0) } else { 0.0 };
    de_casteljau(points[0].as_vec2(), points[1].as_vec2(), points[2].as_vec2(), points[3].as_vec2(), t).y
}

fn bezier_binary_search(points: &[ControlPoint], time: f32) -> f32 {
    let (p0, p1, p2, p3) =
        (points[0].as_vec2(), points[1].as_vec2(), points[2].as_vec2(), points[3].as_vec2());
    let mut low = 0.0_f32;
    let mut high = 1.0_f32;
    let mut t = 0.5_f32;
    for _ in 0..20 {
        let x = de_casteljau(p0, p1, p2, p3, t).x;
        if (x - time).abs() < 1e-5 {
            break;
        }
        if x < time {
            low = t;
        } else {
            high = t;
        }
        t = (low + high) * 0.5;
    }
    de_casteljau(p0, p1, p2, p3, t).y
}

fn bezier_cardano(points: &[ControlPoint], time: f32) -> f32 {
    let (x0, x1, x2, x3) = (points[0].time, points[1].time, points[2].time, points[3].time);
    // x(t) expanded to monomial coefficients, shifted so x(t) = time is a
    // plain root find.
    let a = x3 - 3.0 * x2 + 3.0 * x1 - x0;
    let b = 3.0 * x2 - 6.0 * x1 + 3.0 * x0;
    let c = 3.0 * x1 - 3.0 * x0;
    let d = x0 - time;
    let t = cardano_root_in_unit(a, b, c, d);
    de_casteljau(points[0].as_vec2(), points[1].as_vec2(), points[2].as_vec2(), points[3].as_vec2(), t).y
}

/// Evaluates one segment at `time`. `points` is the segment's slice of the
/// curve's point pool and must hold at least [`SegmentKind::point_span`]
/// entries.
pub fn evaluate_segment(kind: SegmentKind, points: &[ControlPoint], time: f32, solver: BezierSolver) -> f32 {
    match kind {
        SegmentKind::Linear => linear_evaluate(points, time),
        SegmentKind::Bezier => match solver {
            BezierSolver::TimeRatio => bezier_time_ratio(points, time),
            BezierSolver::BinarySearch => bezier_binary_search(points, time),
            BezierSolver::Cardano => bezier_cardano(points, time),
        },
        SegmentKind::Stepped => points[0].value,
        SegmentKind::InverseStepped => points[1].value,
    }
}

/// An evaluable curve: a segment list over a shared point pool.
#[derive(Debug, Clone)]
pub struct CurveTrack {
    pub segments: Vec<Segment>,
    pub points: Vec<ControlPoint>,
}

impl CurveTrack {
    pub fn new(segments: Vec<Segment>, points: Vec<ControlPoint>) -> Self {
        Self { segments, points }
    }

    pub fn first_point(&self) -> Option<ControlPoint> {
        self.points.first().copied()
    }

    pub fn last_point(&self) -> Option<ControlPoint> {
        self.points.last().copied()
    }

    fn segment_points(&self, segment: &Segment) -> &[ControlPoint] {
        let span = segment.kind.point_span();
        &self.points[segment.base_point..segment.base_point + span]
    }

    /// Samples the curve at `time`. Before the first point the first segment
    /// clamps; past the last point the last point's value holds.
    pub fn evaluate(&self, time: f32, solver: BezierSolver) -> f32 {
        for segment in &self.segments {
            let points = self.segment_points(segment);
            if time < points[points.len() - 1].time {
                return evaluate_segment(segment.kind, points, time, solver);
            }
        }
        self.last_point().map(|p| p.value).unwrap_or(0.0)
    }

    /// Samples with the loop seam corrected: past the last point, the value
    /// ramps linearly toward the first point's value at `loop_end`, so a
    /// looped curve whose endpoints disagree by authoring tolerance does not
    /// pop when the motion wraps.
    pub fn evaluate_looped(&self, time: f32, loop_end: f32, solver: BezierSolver) -> f32 {
        let (Some(first), Some(last)) = (self.first_point(), self.last_point()) else {
            return 0.0;
        };
        if time <= last.time {
            return self.evaluate(time, solver);
        }
        let span = loop_end - last.time;
        if span <= 0.0 {
            return last.value;
        }
        let t = ((time - last.time) / span).clamp(0.0, 1.0);
        lerp(last.value, first.value, t)
    }
}
