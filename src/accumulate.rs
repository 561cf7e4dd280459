use rayon::prelude::*;

use crate::buffer::{FrameBuffer, HistoryBuffer, NoisyFrame};

/// `frame_index`번째(0부터) 샘플이 평균에 기여하는 비율.
/// 가중치가 1/(k+1)이라 지수 감쇠가 아니라 리셋 이후 전체 프레임의 산술 평균이 됨.
pub fn accumulation_weight(frame_index: u32) -> f32 {
    1.0 / (frame_index as f32 + 1.0)
}

/// 새 노이즈 프레임을 지금까지의 평균과 섞음. 결과가 화면에도 나가고 다음 프레임의 history도 됨.
pub fn blend(
    noisy: &NoisyFrame,
    history: &HistoryBuffer,
    frame_index: u32,
) -> (FrameBuffer, HistoryBuffer) {
    let mut display = FrameBuffer::new(noisy.resolution());
    blend_into(noisy, history, frame_index, &mut display);
    let new_history = display.clone();

    (display, new_history)
}

/// `blend`의 제자리 버전. `output`은 `noisy` 크기에 맞춰짐.
pub fn blend_into(noisy: &NoisyFrame, history: &HistoryBuffer, frame_index: u32, output: &mut FrameBuffer) {
    output.resize(noisy.resolution());

    // 리셋 직후이거나 history 크기가 다르면 예전 값은 버림
    if frame_index == 0 || history.resolution() != noisy.resolution() {
        output.copy_from(noisy);
        return;
    }

    let weight = accumulation_weight(frame_index);
    output
        .pixels_mut()
        .par_iter_mut()
        .zip(noisy.pixels().par_iter())
        .zip(history.pixels().par_iter())
        .for_each(|((blended, current), previous)| {
            *blended = previous * (1.0 - weight) + current * weight;
        });
}
