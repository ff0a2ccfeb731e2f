use sqlx::SqlitePool;

use crate::services::now_iso;

const LIKERT_OPTIONS: &str =
    r#"["Strongly Agree","Agree","Neutral","Disagree","Strongly Disagree"]"#;

struct SeedQuestion {
    number: i64,
    category: &'static str,
    text: &'static str,
}

const QUESTIONS: &[SeedQuestion] = &[
    SeedQuestion { number: 1, category: "interest", text: "I enjoy coding and working with computers." },
    SeedQuestion { number: 2, category: "interest", text: "I like helping people solve their health problems." },
    SeedQuestion { number: 3, category: "interest", text: "I am interested in how businesses make decisions." },
    SeedQuestion { number: 4, category: "interest", text: "I like designing and building physical things." },
    SeedQuestion { number: 5, category: "aptitude", text: "Mathematics and logic come easily to me." },
    SeedQuestion { number: 6, category: "aptitude", text: "I understand biology and chemistry concepts quickly." },
    SeedQuestion { number: 7, category: "aptitude", text: "I can explain complex ideas clearly to others." },
    SeedQuestion { number: 8, category: "personality", text: "In group projects I usually take charge." },
    SeedQuestion { number: 9, category: "personality", text: "I prefer detailed analysis before making a decision." },
    SeedQuestion { number: 10, category: "personality", text: "I stay calm under pressure." },
    SeedQuestion { number: 11, category: "learning_style", text: "I learn best from diagrams and videos." },
    SeedQuestion { number: 12, category: "learning_style", text: "I remember things better when I try them hands-on." },
];

struct SeedForumCategory {
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    color: &'static str,
    allowed_roles: &'static str,
}

const FORUM_CATEGORIES: &[SeedForumCategory] = &[
    SeedForumCategory {
        name: "Career Guidance",
        description: "Career path discussions, job opportunities, professional development",
        icon: "target",
        color: "#3B82F6",
        allowed_roles: r#"["student","teacher","alumni","college_administrator"]"#,
    },
    SeedForumCategory {
        name: "College Admissions",
        description: "Application help, admission requirements, college selection advice",
        icon: "school",
        color: "#10B981",
        allowed_roles: r#"["student","teacher","alumni","college_administrator"]"#,
    },
    SeedForumCategory {
        name: "Study Resources",
        description: "Notes, books and preparation strategies",
        icon: "book",
        color: "#F59E0B",
        allowed_roles: r#"["student","teacher","alumni","college_administrator"]"#,
    },
    SeedForumCategory {
        name: "Alumni Announcements",
        description: "Openings and mentorship offers shared by alumni",
        icon: "megaphone",
        color: "#8B5CF6",
        allowed_roles: r#"["alumni","college_administrator"]"#,
    },
];

struct SeedPuzzle {
    category: &'static str,
    course: &'static str,
    title: &'static str,
    difficulty: &'static str,
    statement: &'static str,
    hints: &'static str,
    solution: &'static str,
    explanation: &'static str,
}

const PUZZLES: &[SeedPuzzle] = &[
    SeedPuzzle {
        category: "Logic",
        course: "General",
        title: "Number Sequence",
        difficulty: "Easy",
        statement: "What comes next: 2, 4, 8, 16, ?",
        hints: r#"["Each term doubles"]"#,
        solution: "32",
        explanation: "Each number is twice the previous one.",
    },
    SeedPuzzle {
        category: "Programming",
        course: "Computer Science",
        title: "Big O",
        difficulty: "Medium",
        statement: "What is the worst-case time complexity of binary search? Answer in Big O notation.",
        hints: r#"["The search space halves each step"]"#,
        solution: "O(log n)",
        explanation: "Halving the range each step gives a logarithmic number of steps.",
    },
    SeedPuzzle {
        category: "Science",
        course: "Medical",
        title: "Cell Powerhouse",
        difficulty: "Easy",
        statement: "Which organelle is known as the powerhouse of the cell?",
        hints: r#"["It produces ATP"]"#,
        solution: "Mitochondria",
        explanation: "Mitochondria generate most of the chemical energy of the cell.",
    },
    SeedPuzzle {
        category: "Logic",
        course: "General",
        title: "River Crossing",
        difficulty: "Hard",
        statement: "A farmer must ferry a wolf, a goat and a cabbage. What does he take across first?",
        hints: r#"["The wolf will not eat the cabbage"]"#,
        solution: "goat",
        explanation: "Only the goat is unsafe with both other items.",
    },
    SeedPuzzle {
        category: "Business",
        course: "Commerce",
        title: "Profit Margin",
        difficulty: "Medium",
        statement: "Cost 80, price 100. What is the profit margin on price, in percent?",
        hints: r#"["Margin = profit / price"]"#,
        solution: "20",
        explanation: "Profit is 20 on a price of 100.",
    },
];

struct SeedCourse {
    name: &'static str,
    code: &'static str,
    degree_type: &'static str,
    duration: i64,
    fee_per_year: i64,
    seats: i64,
}

struct SeedCollege {
    name: &'static str,
    code: &'static str,
    kind: &'static str,
    city: &'static str,
    state: &'static str,
    nirf_ranking: Option<i64>,
    accreditation: &'static str,
    website: &'static str,
    description: &'static str,
    facilities: &'static str,
    courses: &'static [SeedCourse],
}

const COLLEGES: &[SeedCollege] = &[
    SeedCollege {
        name: "Indian Institute of Technology Delhi",
        code: "IITD",
        kind: "government",
        city: "New Delhi",
        state: "Delhi",
        nirf_ranking: Some(2),
        accreditation: "NAAC A++",
        website: "https://home.iitd.ac.in",
        description: "Premier engineering institution with world-class faculty.",
        facilities: r#"["Hostel","Library","Labs","Sports Complex"]"#,
        courses: &[
            SeedCourse { name: "B.Tech Computer Science", code: "CSE", degree_type: "undergraduate", duration: 4, fee_per_year: 220_000, seats: 120 },
            SeedCourse { name: "B.Tech Mechanical Engineering", code: "ME", degree_type: "undergraduate", duration: 4, fee_per_year: 220_000, seats: 100 },
            SeedCourse { name: "M.Tech Data Science", code: "MDS", degree_type: "postgraduate", duration: 2, fee_per_year: 150_000, seats: 40 },
        ],
    },
    SeedCollege {
        name: "All India Institute of Medical Sciences",
        code: "AIIMS",
        kind: "government",
        city: "New Delhi",
        state: "Delhi",
        nirf_ranking: Some(1),
        accreditation: "NMC",
        website: "https://www.aiims.edu",
        description: "Top medical college with excellent clinical training.",
        facilities: r#"["Hospital","Hostel","Research Labs"]"#,
        courses: &[
            SeedCourse { name: "MBBS", code: "MBBS", degree_type: "undergraduate", duration: 5, fee_per_year: 1_650, seats: 125 },
            SeedCourse { name: "B.Sc Nursing", code: "BSCN", degree_type: "undergraduate", duration: 4, fee_per_year: 1_200, seats: 75 },
        ],
    },
    SeedCollege {
        name: "Shri Ram College of Commerce",
        code: "SRCC",
        kind: "government",
        city: "New Delhi",
        state: "Delhi",
        nirf_ranking: Some(13),
        accreditation: "NAAC A++",
        website: "https://www.srcc.edu",
        description: "Leading commerce and economics college.",
        facilities: r#"["Library","Auditorium","Placement Cell"]"#,
        courses: &[
            SeedCourse { name: "B.Com (Honours)", code: "BCOMH", degree_type: "undergraduate", duration: 3, fee_per_year: 30_000, seats: 600 },
            SeedCourse { name: "BA Economics (Honours)", code: "ECOH", degree_type: "undergraduate", duration: 3, fee_per_year: 30_000, seats: 150 },
        ],
    },
    SeedCollege {
        name: "Manipal Institute of Technology",
        code: "MIT-MANIPAL",
        kind: "private",
        city: "Manipal",
        state: "Karnataka",
        nirf_ranking: Some(56),
        accreditation: "NAAC A++",
        website: "https://manipal.edu/mit.html",
        description: "Private engineering institute with a large international campus.",
        facilities: r#"["Hostel","Library","Innovation Centre"]"#,
        courses: &[
            SeedCourse { name: "B.Tech Computer Science", code: "CSE", degree_type: "undergraduate", duration: 4, fee_per_year: 480_000, seats: 360 },
            SeedCourse { name: "BBA", code: "BBA", degree_type: "undergraduate", duration: 3, fee_per_year: 250_000, seats: 120 },
        ],
    },
    SeedCollege {
        name: "Christ University",
        code: "CHRIST",
        kind: "deemed",
        city: "Bengaluru",
        state: "Karnataka",
        nirf_ranking: None,
        accreditation: "NAAC A+",
        website: "https://christuniversity.in",
        description: "Multidisciplinary deemed university.",
        facilities: r#"["Library","Sports","Cafeteria"]"#,
        courses: &[
            SeedCourse { name: "BCA", code: "BCA", degree_type: "undergraduate", duration: 3, fee_per_year: 150_000, seats: 180 },
            SeedCourse { name: "MBA", code: "MBA", degree_type: "postgraduate", duration: 2, fee_per_year: 400_000, seats: 240 },
        ],
    },
];

/// Inserts reference data into empty tables. Safe to call on every start.
pub async fn seed_reference_data(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_questions(pool).await?;
    seed_forum_categories(pool).await?;
    seed_puzzles(pool).await?;
    seed_colleges(pool).await?;
    Ok(())
}

async fn table_is_empty(pool: &SqlitePool, table: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(&format!(r#"SELECT COUNT(*) FROM "{table}""#))
        .fetch_one(pool)
        .await?;
    Ok(count == 0)
}

async fn seed_questions(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    if !table_is_empty(pool, "assessment_questions").await? {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for q in QUESTIONS {
        sqlx::query(
            r#"
            INSERT INTO "assessment_questions" ("question_number", "category", "question_text", "options")
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(q.number)
        .bind(q.category)
        .bind(q.text)
        .bind(LIKERT_OPTIONS)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(count = QUESTIONS.len(), "seeded assessment questions");
    Ok(())
}

async fn seed_forum_categories(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    if !table_is_empty(pool, "forum_categories").await? {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for (idx, c) in FORUM_CATEGORIES.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO "forum_categories" ("name", "description", "icon", "color", "allowed_roles", "sort_order")
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(c.name)
        .bind(c.description)
        .bind(c.icon)
        .bind(c.color)
        .bind(c.allowed_roles)
        .bind(idx as i64)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(count = FORUM_CATEGORIES.len(), "seeded forum categories");
    Ok(())
}

async fn seed_puzzles(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    if !table_is_empty(pool, "puzzles").await? {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for p in PUZZLES {
        let existing: Option<i64> =
            sqlx::query_scalar(r#"SELECT "id" FROM "puzzle_categories" WHERE "name" = ? AND "course" = ?"#)
                .bind(p.category)
                .bind(p.course)
                .fetch_optional(&mut *tx)
                .await?;

        let category_id = match existing {
            Some(id) => id,
            None => sqlx::query(r#"INSERT INTO "puzzle_categories" ("name", "course") VALUES (?, ?)"#)
                .bind(p.category)
                .bind(p.course)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid(),
        };

        sqlx::query(
            r#"
            INSERT INTO "puzzles"
              ("category_id", "title", "difficulty", "problem_statement", "hints", "solution", "explanation")
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(category_id)
        .bind(p.title)
        .bind(p.difficulty)
        .bind(p.statement)
        .bind(p.hints)
        .bind(p.solution)
        .bind(p.explanation)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(count = PUZZLES.len(), "seeded puzzles");
    Ok(())
}

async fn seed_colleges(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    if !table_is_empty(pool, "colleges").await? {
        return Ok(());
    }

    let now = now_iso();
    let mut tx = pool.begin().await?;
    for c in COLLEGES {
        let college_id = sqlx::query(
            r#"
            INSERT INTO "colleges"
              ("name", "code", "type", "location", "city", "state", "nirf_ranking", "accreditation",
               "website", "description", "facilities", "created_at", "updated_at")
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(c.name)
        .bind(c.code)
        .bind(c.kind)
        .bind(format!("{}, {}", c.city, c.state))
        .bind(c.city)
        .bind(c.state)
        .bind(c.nirf_ranking)
        .bind(c.accreditation)
        .bind(c.website)
        .bind(c.description)
        .bind(c.facilities)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for course in c.courses {
            sqlx::query(
                r#"
                INSERT INTO "courses"
                  ("college_id", "name", "code", "degree_type", "duration", "fee_per_year", "total_seats")
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(college_id)
            .bind(course.name)
            .bind(course.code)
            .bind(course.degree_type)
            .bind(course.duration)
            .bind(course.fee_per_year)
            .bind(course.seats)
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;

    tracing::info!(count = COLLEGES.len(), "seeded colleges");
    Ok(())
}
