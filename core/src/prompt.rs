//! Maps a [`GenerationRequest`] to a system instruction and a user
//! prompt. Pure functions, one branch per work mode.

use edugen_common::{GenerationRequest, WorkMode};

pub const SYSTEM_INSTRUCTION: &str = r#"
Bạn là trợ lý AI chuyên tạo đề thi và bài tập ôn luyện theo chương trình 2018.

QUY TẮC CHUNG:
1. Mọi công thức toán học phải được đặt trong $...$.
2. Luôn tuân thủ nghiêm ngặt các "YÊU CẦU BỔ SUNG QUAN TRỌNG" do người dùng cung cấp.

QUY TẮC CHO CHẾ ĐỘ "TẠO BÀI TẬP":
1. Cấu trúc đầu ra phải tuân thủ nghiêm ngặt:
    - PHẦN 1: ĐỀ BÀI (Liệt kê tất cả các câu hỏi).
    - ### PHẦN 2: ĐÁP ÁN VÀ LỜI GIẢI (Trình bày lời giải đầy đủ, logic cho từng câu, sau đó liệt kê đáp án ngắn gọn).
2. Đảm bảo phần lời giải chi tiết phải thực sự rõ ràng, dễ hiểu, giải thích từng bước.
3. Khi người dùng chọn một loại câu hỏi cụ thể, hãy tuân thủ định dạng đầu ra sau đây một cách nghiêm ngặt:
    - **Nếu loại là 'Trắc nghiệm (4 lựa chọn)'**:
        Câu [Số]: [Nội dung câu hỏi]
        A. [Đáp án A]
        B. [Đáp án B]
        C. [Đáp án C]
        D. [Đáp án D]
    - **Nếu loại là 'Trắc nghiệm Đúng - Sai'**:
        Câu [Số]: [Yêu cầu chung cho các phát biểu].
        a) [Phát biểu a].
        b) [Phát biểu b].
        c) [Phát biểu c].
        d) [Phát biểu d].
        (Trong phần đáp án và lời giải, cho biết mỗi phát biểu là Đúng hay Sai).
    - **Nếu loại là 'Điền đáp án / Trả lời ngắn'**:
        Câu [Số]: [Nội dung câu hỏi]
        Kết quả:................
"#;

pub const LESSON_PLAN_INSTRUCTION: &str = r#"
BẠN LÀ CHUYÊN GIA SOẠN GIÁO ÁN PHÁT TRIỂN NĂNG LỰC SỐ (NLS) THEO CHƯƠNG TRÌNH 2018.
- CẤU TRÚC BẮT BUỘC:
  - TIÊU ĐỀ IN HOA
  - I. MỤC TIÊU
  - II. THIẾT BỊ DẠY HỌC VÀ HỌC LIỆU
  - III. TIẾN TRÌNH DẠY HỌC (Gồm các Hoạt động: Khởi động, Hình thành kiến thức, Luyện tập, Vận dụng)
  - IV. BẢNG MÔ TẢ CÁC NĂNG LỰC SỐ (Nếu có yêu cầu)
- QUY TẮC ĐỊNH DẠNG: Sử dụng LaTeX $...$ cho công thức toán. Tuyệt đối KHÔNG dùng bold/italic.
"#;

pub const PRESENTATION_INSTRUCTION: &str = r#"
BẠN LÀ MỘT NHÀ THIẾT KẾ BÀI GIẢNG AI XUẤT SẮC.
- **NHIỆM VỤ CỐT LÕI:** Chuyển hóa giáo án được cung cấp thành một bài trình chiếu logic, hấp dẫn, và có tính thẩm mỹ cao.

- **QUY TẮC VỀ PHONG CÁCH (RẤT QUAN TRỌNG):**
  1.  **CHỌN MỘT CHỦ ĐỀ MÀU SẮC:** Ngay dòng đầu tiên, hãy chọn một chủ đề và khai báo bằng thẻ. Ví dụ: '[THEME: Xanh Dương]'. Các lựa chọn có thể là: "Xanh Dương", "Xanh Lá", "Cam", "Tím".
  2.  **NHẤN MẠNH NỘI DUNG:** Sử dụng định dạng Markdown '**từ khóa**' để IN ĐẬM các thuật ngữ, tiêu đề, hoặc điểm quan trọng cần học sinh chú ý.

- **QUY TẮC CẤU TRÚC SLIDE:**
  1.  **Phân tách slide:** Luôn sử dụng dấu '---' để ngắt giữa các slide.
  2.  **Tiêu đề slide:** Mỗi slide BẮT ĐẦU bằng '### Slide [Số]: [Tiêu đề ngắn gọn, hấp dẫn]'.
  3.  **Trình tự nội dung:** Phân tích giáo án và chuyển hóa thành slide theo đúng trình tự: Khởi động -> Hình thành kiến thức -> Luyện tập -> Vận dụng.
  4.  **Hình minh họa:** Slide nào cần hình minh họa, thêm một dòng '[IMAGE_PROMPT: mô tả hình ảnh bằng tiếng Anh]'. Tối đa một thẻ mỗi slide.

- **QUY TẮC NỘI DUNG VÀ BỐ CỤC:**
  1.  **RÕ RÀNG & SÚC TÍCH:** Nội dung trên mỗi slide phải dễ đọc. Tránh nhiều chữ. Dùng gạch đầu dòng, danh sách số, và đoạn văn ngắn.
  2.  **LÀM NỔI BẬT NĂNG LỰC SỐ (NLS):** Nếu có hoạt động sử dụng công cụ số, hãy tạo slide riêng và làm nổi bật bằng tiêu đề như "💻 Hoạt động NLS:" hoặc "🚀 Thử thách số:".

- **QUY TẮC ĐỊNH DẠNG:** Sử dụng LaTeX '$...$' cho công thức toán.
"#;

#[derive(Debug, Clone)]
pub struct PromptParts {
    pub system_instruction: &'static str,
    pub user_prompt: String,
}

pub fn select(request: &GenerationRequest) -> PromptParts {
    let extra = if request.instructions.trim().is_empty() {
        String::new()
    } else {
        format!(
            "\n\nYÊU CẦU BỔ SUNG QUAN TRỌNG: {}",
            request.instructions
        )
    };

    match request.mode {
        WorkMode::LessonPlan => PromptParts {
            system_instruction: LESSON_PLAN_INSTRUCTION,
            user_prompt: format!(
                "CHẾ ĐỘ: Giáo án NLS. Môn: {}, Lớp: {}, Bài: {}. Dữ liệu: {}{}",
                request.subject,
                request.grade,
                request.topic,
                requirements_or_na(&request.requirements),
                extra
            ),
        },
        WorkMode::Presentation => PromptParts {
            system_instruction: PRESENTATION_INSTRUCTION,
            user_prompt: format!(
                "CHẾ ĐỘ: Thiết kế Slide. Môn: {}, Lớp: {}, Chủ đề: {}. Dữ liệu giáo án: {}{}",
                request.subject,
                request.grade,
                request.topic,
                requirements_or_na(&request.requirements),
                extra
            ),
        },
        WorkMode::Exercise => {
            // Literature assignments are a single essay prompt no
            // matter what count was configured.
            let count = if request.is_literature() {
                1
            } else {
                request.question_count
            };
            PromptParts {
                system_instruction: SYSTEM_INSTRUCTION,
                user_prompt: format!(
                    "Tạo bài tập: {}, Lớp: {}, Chủ đề: {}, Loại: {}, Mức độ: {}, Số câu: {}. Dữ liệu: {}{}",
                    request.subject,
                    request.grade,
                    request.topic,
                    request.question_type.label(),
                    request.difficulty.label(),
                    count,
                    request.requirements,
                    extra
                ),
            }
        }
    }
}

fn requirements_or_na(requirements: &str) -> &str {
    if requirements.trim().is_empty() {
        "N/A"
    } else {
        requirements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edugen_common::{Difficulty, Grade, QuestionType};

    fn request(mode: WorkMode, subject: &str) -> GenerationRequest {
        GenerationRequest {
            mode,
            subject: subject.to_string(),
            grade: Grade::new(12).expect("valid grade"),
            topic: "Hàm số".to_string(),
            requirements: String::new(),
            instructions: String::new(),
            question_type: QuestionType::Mixed,
            difficulty: Difficulty::Mixed,
            question_count: 10,
        }
    }

    #[test]
    fn mode_selects_instruction() {
        let r = request(WorkMode::Exercise, "Toán");
        assert_eq!(select(&r).system_instruction, SYSTEM_INSTRUCTION);
        let r = request(WorkMode::LessonPlan, "Toán");
        assert_eq!(select(&r).system_instruction, LESSON_PLAN_INSTRUCTION);
        let r = request(WorkMode::Presentation, "Toán");
        assert_eq!(select(&r).system_instruction, PRESENTATION_INSTRUCTION);
    }

    #[test]
    fn literature_pins_question_count() {
        let r = request(WorkMode::Exercise, "Ngữ văn / Tiếng Việt");
        assert!(select(&r).user_prompt.contains("Số câu: 1"));
        let r = request(WorkMode::Exercise, "Toán");
        assert!(select(&r).user_prompt.contains("Số câu: 10"));
    }

    #[test]
    fn additional_instructions_are_appended() {
        let mut r = request(WorkMode::LessonPlan, "Vật lý");
        r.instructions = "in đậm từ khóa".to_string();
        let prompt = select(&r).user_prompt;
        assert!(prompt.contains("YÊU CẦU BỔ SUNG QUAN TRỌNG: in đậm từ khóa"));

        let r = request(WorkMode::LessonPlan, "Vật lý");
        assert!(!select(&r).user_prompt.contains("YÊU CẦU BỔ SUNG"));
    }

    #[test]
    fn empty_requirements_become_na_for_lesson_plan() {
        let r = request(WorkMode::LessonPlan, "Hóa học");
        assert!(select(&r).user_prompt.contains("Dữ liệu: N/A"));
    }
}
