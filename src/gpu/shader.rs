use crate::backend::Program;
use crate::tracer::scene::MAX_SPHERES;

const FULLSCREEN_WGSL: &str = include_str!("shaders/fullscreen.wgsl");
const TRACE_WGSL_TEMPLATE: &str = include_str!("shaders/trace.wgsl");
const ACCUMULATE_WGSL: &str = include_str!("shaders/accumulate.wgsl");

/// 프로그램 하나의 WGSL 전체. 공용 정점 셰이더를 앞에 붙이고 크기 상수를 채워 넣음
pub(super) fn build_program_wgsl(program: Program) -> String {
    let fragment = match program {
        Program::PathTrace => {
            TRACE_WGSL_TEMPLATE.replace("__MAX_SPHERES__", &format!("{MAX_SPHERES}u"))
        }
        Program::Accumulate => ACCUMULATE_WGSL.to_string(),
    };

    format!("{FULLSCREEN_WGSL}\n{fragment}")
}
