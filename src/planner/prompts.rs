//! Prompt templates. The backend is asked for Russian text; only the
//! preference answer has a machine-checked shape.

use crate::profile::UserProfile;

pub fn preference_analysis(cooking_preferences: &str) -> String {
    format!(
        "Ты — эксперт по питанию. Пользователь описал свои предпочтения в готовке:
\"{cooking_preferences}\".

Ответь кратко:
- Сколько дней в неделю пользователь хочет готовить?
- Сколько минут он готов тратить на одну готовку?

Формат ответа (строго одна строка):
Дни готовки: X; Время готовки: Y минут."
    )
}

pub fn meal_descriptions(profile: &UserProfile, override_prompt: &str, history: &str) -> String {
    format!(
        "{history}
Ты — помощник по планированию питания.
Составь список ровно из 10 блюд, которые подойдут пользователю, учитывая:
1. Информацию о пользователе и его цели: {about}.
2. Запрещённые продукты: {forbidden}.
3. Любимые продукты: {favorite}.
4. Предпочтения в готовке (время, бюджет, цели): {preferences}.

Новые требования пользователя: {override_prompt}.

Формат ответа: каждое блюдо на отдельной строке, без нумерации, вступлений и пояснений.",
        about = profile.about_user,
        forbidden = profile.forbidden_products,
        favorite = profile.favorite_products,
        preferences = profile.cooking_preferences,
    )
}

pub fn block_plan(grounding: &str, profile: &UserProfile, days: &[&str], current_state: &str) -> String {
    let days = days.join(", ");
    format!(
        "Ты — профессиональный помощник по планированию питания. Составь план питания на дни: {days}.

Условия:
1. Не повторяй блюда, которые уже вошли в план на предыдущие дни:
{current_state}

2. Завтрак, обед и ужин одинаковы во все указанные дни: готовка происходит один раз на весь блок.

3. Учитывай запрещённые продукты ({forbidden}) и предпочтения в готовке ({preferences}).

4. Используй подходящие готовые рецепты:
{grounding}
Если они не подходят, предложи свои.

5. Формат ответа: один блок на все дни. Заголовок — список дней, подзаголовки — приёмы пищи.
Для каждого блюда: название, краткий рецепт (2-3 предложения), ингредиенты с количеством,
калорийность и БЖУ.",
        forbidden = profile.forbidden_products,
        preferences = profile.cooking_preferences,
    )
}

pub fn shopping_schedule(meal_plan: &str, days: &[&str], current_state: &str) -> String {
    let days = days.join(", ");
    format!(
        "Ты — профессиональный помощник по планированию питания. Составь график закупок и готовки на дни: {days}.

План питания:
{meal_plan}

Графики на предыдущие дни (не дублируй их покупки):
{current_state}

Требования:
1. Закупка и готовка всех блюд проходят один раз — в первый из указанных дней.
2. Объёмы рассчитаны так, чтобы еды хватило на все указанные дни.
3. Заголовок — список дней. Разделы: «Список продуктов» (продукт — количество) и «Список блюд» (название, краткий рецепт).
4. Ответ краткий."
    )
}
