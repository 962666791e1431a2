//! Option catalogs offered by the input form.

pub const LITERATURE_SUBJECT: &str = "Ngữ văn / Tiếng Việt";

pub const SUBJECTS: &[&str] = &[
    "Toán",
    "Ngữ văn / Tiếng Việt",
    "Tiếng Anh",
    "Vật lý",
    "Hóa học",
    "Sinh học",
    "Lịch sử",
    "Địa lý",
    "Lịch sử và Địa lý (THCS/Tiểu học)",
    "Giáo dục công dân / Đạo đức",
    "Tin học",
    "Công nghệ",
    "Khoa học tự nhiên",
    "Giáo dục quốc phòng",
    "Khác",
];

pub const QUESTION_COUNTS: &[u32] = &[5, 10, 15, 20, 25, 30];
