//! The `supasurvey init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_sample(Path::new("supasurvey.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("survey")?;
    write_sample(Path::new("survey/schema.csv"), SAMPLE_SCHEMA)?;
    write_sample(Path::new("survey/responses.json"), SAMPLE_RESPONSES)?;

    println!("\nNext steps:");
    println!("  1. Edit survey/schema.csv to describe your survey");
    println!("  2. Run: supasurvey validate");
    println!("  3. Run: supasurvey score --responses survey/responses.json");

    Ok(())
}

fn write_sample(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# supasurvey configuration

schema = "survey/schema.csv"

# What to do with answers whose type has no field builder:
# "lenient" omits the field and logs a warning, "strict" fails.
unknown_types = "lenient"

output_dir = "./supasurvey-reports"
"#;

const SAMPLE_SCHEMA: &str = r#"section_id,section_display,section_title,questionset_id,questionset_title,questionset_description,questionset_repeater_label,questionset_dependencies,answer_label,answer_type,answer_options,answer_minscore,answer_maxscore,answer_scoring,answer_correct,answer_required
1,One,About you,1,Good dog,Tell us about yourself,,,What is your name?,char,,,2,,,
1,One,About you,1,Good dog,Tell us about yourself,,,What is your email address?,email,,,2,,,yes
1,One,About you,1,Good dog,Tell us about yourself,,,Are you a good dog?,yes-no,,,10,,,yes
1,One,About you,1,Good dog,Tell us about yourself,,,"If yes, how long have you been a good dog?",choose-one,1-2 years|3-5 years|5-10 years,1,,3|4|5,,
1,One,About you,2,Discovery,,,,How did you first hear about being a good dog?,choose-one-open,A friend/family member told me about it|I heard about it online|I saw it at a bookstore,,,3|2|2|1,,
2,Two,Household,3,Pets,One entry per pet,Add another pet,,Pet name,char,,,1,,,
2,Two,Household,3,Pets,One entry per pet,Add another pet,,Indoor?,yes-no,,,1,,,
2,Two,Household,4,Documents,,,,Upload any vet records,file-multiple,,,,,,
"#;

const SAMPLE_RESPONSES: &str = r#"[
  {
    "response": "rex",
    "questionset": 1,
    "instances": [
      {
        "questionset_1__answer_2": "x@y.com",
        "questionset_1__answer_3": "Yes",
        "questionset_1__answer_4": "3-5 years"
      }
    ]
  },
  {
    "response": "rex",
    "questionset": 2,
    "instances": [
      {
        "questionset_2__answer_1": "other",
        "questionset_2__answer_1_other": "A podcast"
      }
    ]
  },
  {
    "response": "rex",
    "questionset": 3,
    "instances": [
      { "questionset_3__answer_1": "Tom", "questionset_3__answer_2": "Yes" },
      { "questionset_3__answer_1": "Felix" }
    ],
    "verified_score": "2"
  }
]
"#;
